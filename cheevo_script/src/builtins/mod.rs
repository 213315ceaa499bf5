//! Functions available to every script.
//!
//! Each submodule exposes a `BUILTINS` table; the tables are merged into one
//! read-only registry on first use.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::ast::Location;
use crate::clause::Clause;
use crate::error::{CompileError, EvalError};
use crate::interpreter::call_function;
use crate::scope::Scope;
use crate::value::Value;

mod assets;
mod collections;
mod flow;
mod memory;

pub(crate) use memory::size_name;

/// Value used when an optional argument is omitted.
#[derive(Debug, Clone, Copy)]
pub enum DefaultArg {
    Int(i64),
    Bool(bool),
    Str(&'static str),
    Void,
}

impl DefaultArg {
    fn value(self) -> Value {
        match self {
            DefaultArg::Int(n) => Value::Integer(n),
            DefaultArg::Bool(b) => Value::Bool(b),
            DefaultArg::Str(s) => Value::String(s.to_string()),
            DefaultArg::Void => Value::Void,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<DefaultArg>,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self { name, default: None }
    }

    pub const fn optional(name: &'static str, default: DefaultArg) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }
}

pub type Handler = fn(&CallContext<'_>) -> Result<Value, EvalError>;

pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    /// Extra positional arguments are collected into [`CallContext::rest`].
    pub variadic: bool,
    pub handler: Handler,
}

/// Bound arguments of one builtin call.
pub struct CallContext<'a> {
    pub scope: &'a Scope<'a>,
    pub builtin: &'static Builtin,
    pub location: Location,
    args: Vec<Value>,
    pub rest: Vec<Value>,
}

impl CallContext<'_> {
    pub fn error(&self, message: impl std::fmt::Display) -> EvalError {
        EvalError::new(format!("{}: {message}", self.builtin.name), self.location)
    }

    /// A compile failure wrapped as `<name> call failed`.
    pub fn compile_error(&self, err: &CompileError) -> EvalError {
        EvalError::wrap(
            format!("{} call failed", self.builtin.name),
            self.location,
            EvalError::compile(err, self.location),
        )
    }

    fn position(&self, name: &str) -> usize {
        self.builtin
            .params
            .iter()
            .position(|param| param.name == name)
            .unwrap_or(usize::MAX)
    }

    pub fn arg(&self, name: &str) -> &Value {
        self.args.get(self.position(name)).unwrap_or(&Value::Void)
    }

    pub fn integer(&self, name: &str) -> Result<i64, EvalError> {
        match self.arg(name) {
            Value::Integer(n) => Ok(*n),
            other => Err(self.error(format!("{name} must be an integer, found {}", other.type_name()))),
        }
    }

    pub fn unsigned(&self, name: &str) -> Result<u32, EvalError> {
        let n = self.integer(name)?;
        u32::try_from(n).map_err(|_| self.error(format!("{name} must be between 0 and {}, found {n}", u32::MAX)))
    }

    pub fn string(&self, name: &str) -> Result<String, EvalError> {
        match self.arg(name) {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.error(format!("{name} must be a string, found {}", other.type_name()))),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, EvalError> {
        match self.arg(name) {
            Value::Bool(b) => Ok(*b),
            other => Err(self.error(format!("{name} must be a boolean, found {}", other.type_name()))),
        }
    }

    /// An argument that may read memory.
    pub fn clause(&self, name: &str) -> Result<Clause, EvalError> {
        let value = self.arg(name);
        value
            .to_clause()
            .ok_or_else(|| self.error(format!("{name} must be a condition or value, found {}", value.type_name())))
    }

    pub fn is_void(&self, name: &str) -> bool {
        matches!(self.arg(name), Value::Void)
    }

    /// Calls a function value with positional arguments.
    pub fn call(&self, function: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        match function {
            Value::Function(closure) => call_function(self.scope, closure, args, Vec::new(), self.location),
            other => Err(self.error(format!("expected a function, found {}", other.type_name()))),
        }
    }
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, &'static Builtin> = build_registry();
}

fn build_registry() -> HashMap<&'static str, &'static Builtin> {
    let mut registry = HashMap::new();
    let tables: [&'static [Builtin]; 4] = [memory::BUILTINS, flow::BUILTINS, collections::BUILTINS, assets::BUILTINS];
    for builtin in tables.into_iter().flatten() {
        registry.insert(builtin.name, builtin);
    }
    registry
}

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    REGISTRY.get(name).copied()
}

/// Binds `positional` and `named` to the builtin's parameters and runs it.
pub(crate) fn invoke(
    scope: &Scope<'_>,
    builtin: &'static Builtin,
    positional: Vec<Value>,
    mut named: Vec<(String, Value)>,
    location: Location,
) -> Result<Value, EvalError> {
    let fail = |message: String| EvalError::new(format!("{}: {message}", builtin.name), location);
    if !builtin.variadic && positional.len() > builtin.params.len() {
        return Err(fail(format!(
            "takes {} argument(s) but {} were given",
            builtin.params.len(),
            positional.len()
        )));
    }

    let mut positional = positional.into_iter();
    let mut args = Vec::with_capacity(builtin.params.len());
    for param in builtin.params {
        let by_name = named.iter().position(|(name, _)| name == param.name);
        let value = match (positional.next(), by_name, param.default) {
            (Some(_), Some(_), _) => return Err(fail(format!("argument {} given twice", param.name))),
            (Some(value), None, _) => value,
            (None, Some(index), _) => named.remove(index).1,
            (None, None, Some(default)) => default.value(),
            (None, None, None) => return Err(fail(format!("missing required argument {}", param.name))),
        };
        args.push(value);
    }
    if let Some((unknown, _)) = named.first() {
        return Err(fail(format!("no parameter named {unknown}")));
    }

    let context = CallContext {
        scope,
        builtin,
        location,
        args,
        rest: positional.collect(),
    };
    (builtin.handler)(&context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_every_table() {
        for name in ["byte", "bit", "once", "tally", "range", "format", "achievement", "rich_presence_lookup"] {
            assert!(lookup(name).is_some(), "missing builtin {name}");
        }
        assert!(lookup("no_such_builtin").is_none());
    }
}
