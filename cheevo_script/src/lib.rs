//! cheevo_script: achievement script interpreter, trigger compiler and
//! trigger decompiler.
//!
//! A script is parsed with [`parse_program`], run by an [`Interpreter`]
//! that records the achievements, leaderboards and rich presence it
//! declares, and rendered as TOML with [`ScriptOutput::to_toml`]. Compiled
//! triggers go the other way through [`decompile`].

pub mod ast;
pub mod builtins;
pub mod clause;
pub mod compiler;
pub mod config;
pub mod decompiler;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod parser;
pub mod scope;
pub mod value;

pub use cheevo_data::{Trigger, ValueExpression};
pub use compiler::{compile_trigger, compile_value};
pub use config::{Config, ConfigError};
pub use decompiler::{PrintOptions, decompile, decompile_value};
pub use error::{CompileError, ErrorCategory, EvalError};
pub use interpreter::{Interpreter, Progress, RunOutcome};
pub use output::ScriptOutput;
pub use parser::{AstError, parse_expression, parse_program};

use thiserror::Error;

use crate::clause::Clause;
use crate::scope::{InterpreterContext, Scope, ScopeContext};

/// Any failure on the way from source text to compiled assets.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] AstError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Parses and runs a whole script.
///
/// # Errors
/// Returns the parse error or the first evaluation error. Assets declared
/// before an evaluation error are lost; use [`Interpreter`] directly to keep
/// them.
pub fn compile_script(source: &str) -> Result<ScriptOutput, ScriptError> {
    let program = parse_program(source)?;
    let interpreter = Interpreter::new();
    interpreter.run(&program, None)?;
    Ok(interpreter.into_output())
}

/// Compiles one condition expression such as `once(byte(0x10) == 1)`.
///
/// # Errors
/// Fails when the source does not parse, does not evaluate to a condition,
/// or cannot be represented as a trigger.
pub fn compile_trigger_expression(source: &str) -> Result<Trigger, ScriptError> {
    let clause = evaluate_clause(source)?;
    Ok(compile_trigger(&clause)?)
}

/// Compiles one value expression such as `byte(0x10) * 10`.
///
/// # Errors
/// Fails like [`compile_trigger_expression`].
pub fn compile_value_expression(source: &str) -> Result<ValueExpression, ScriptError> {
    let clause = evaluate_clause(source)?;
    Ok(compile_value(&clause)?)
}

fn evaluate_clause(source: &str) -> Result<Clause, ScriptError> {
    let expression = parse_expression(source)?;
    let root = Scope::root(ScopeContext::Interpreter(InterpreterContext::default()));
    let value = interpreter::evaluate(&root, &expression)?;
    value.to_clause().ok_or_else(|| {
        ScriptError::Eval(EvalError::new(
            format!("expected a condition, found {}", value.type_name()),
            expression.location,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_compile_directly() {
        let trigger = compile_trigger_expression("once(byte(0x10) == 1) && byte(0x11) > 2").expect("trigger");
        assert_eq!(trigger.to_string(), "0xH000010=1.1._0xH000011>2");
        let value = compile_value_expression("byte(0x10) * 10").expect("value");
        assert_eq!(value.to_string(), "M:0xH000010*10");
    }

    #[test]
    fn non_conditions_are_rejected() {
        assert!(matches!(
            compile_trigger_expression("\"text\""),
            Err(ScriptError::Eval(_))
        ));
        assert!(matches!(compile_trigger_expression("byte(("), Err(ScriptError::Parse(_))));
    }
}
