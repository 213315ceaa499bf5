//! Expression evaluator.
//!
//! Walks the parsed program against a [`Scope`] chain. Constants fold
//! eagerly; anything that reads emulated memory becomes a [`Clause`] tree
//! that the trigger compiler lowers when an asset function receives it.

use std::cell::RefCell;
use std::rc::Rc;

use cheevo_data::{FieldKind, RequirementOperator};
use log::{debug, info};

use crate::ast::{BinaryOp, Expression, ExpressionKind, Location, UnaryOp};
use crate::builtins;
use crate::clause::Clause;
use crate::error::{EvalError, EvalErrorKind};
use crate::output::ScriptOutput;
use crate::scope::{InterpreterContext, MAX_CALL_DEPTH, Scope, ScopeContext};
use crate::value::{Closure, RangeIter, Value};

/// Receives progress from [`Interpreter::run`] and may cancel it.
pub trait Progress {
    fn report(&mut self, percent: u8, line: usize);

    /// Polled before every top-level statement.
    fn is_aborted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Runs a program and collects the assets it declares.
#[derive(Debug, Default)]
pub struct Interpreter {
    output: Rc<RefCell<ScriptOutput>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates every top-level statement in order. Assets declared before
    /// a failure stay in [`Interpreter::output`].
    ///
    /// # Errors
    /// Returns the first [`EvalError`] raised by the program.
    pub fn run(&self, program: &[Expression], mut progress: Option<&mut dyn Progress>) -> Result<RunOutcome, EvalError> {
        let context = InterpreterContext {
            output: Rc::clone(&self.output),
        };
        let root = Scope::root(ScopeContext::Interpreter(context));
        let total = program.len().max(1);

        for (index, statement) in program.iter().enumerate() {
            if progress.as_ref().is_some_and(|p| p.is_aborted()) {
                info!("script run aborted before line {}", statement.location.line);
                return Ok(RunOutcome::Aborted);
            }
            evaluate(&root, statement)?;
            if let Some(progress) = progress.as_mut() {
                let percent = u8::try_from((index + 1) * 100 / total).unwrap_or(100);
                progress.report(percent, statement.location.line);
            }
        }
        Ok(RunOutcome::Completed)
    }

    pub fn output(&self) -> std::cell::Ref<'_, ScriptOutput> {
        self.output.borrow()
    }

    pub fn into_output(self) -> ScriptOutput {
        match Rc::try_unwrap(self.output) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        }
    }
}

/// Runs statements until one of them returns from the enclosing function.
fn execute_block(scope: &Scope<'_>, body: &[Expression]) -> Result<(), EvalError> {
    for statement in body {
        evaluate(scope, statement)?;
        if scope.is_complete() {
            break;
        }
    }
    Ok(())
}

pub(crate) fn evaluate(scope: &Scope<'_>, expr: &Expression) -> Result<Value, EvalError> {
    let location = expr.location;
    match &expr.kind {
        ExpressionKind::Integer(n) => Ok(Value::Integer(*n)),
        ExpressionKind::Float(f) => Ok(Value::Float(*f)),
        ExpressionKind::Bool(b) => Ok(Value::Bool(*b)),
        ExpressionKind::String(s) => Ok(Value::String(s.clone())),
        ExpressionKind::Variable(name) => lookup_variable(scope, name, location),
        ExpressionKind::Array(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(scope, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(values))
        },
        ExpressionKind::Dictionary(entries) => {
            let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = evaluate(scope, key)?;
                let value = evaluate(scope, value)?;
                match pairs.iter_mut().find(|(existing, _)| existing.key_eq(&key)) {
                    Some(entry) => entry.1 = value,
                    None => pairs.push((key, value)),
                }
            }
            Ok(Value::dictionary(pairs))
        },
        ExpressionKind::Index { target, index } => {
            let container = evaluate(scope, target)?;
            let index = evaluate(scope, index)?;
            read_index(&container, &index, location)
        },
        ExpressionKind::Call { name, args } => {
            let mut positional = Vec::new();
            let mut named = Vec::new();
            for arg in args {
                let value = evaluate(scope, &arg.value)?;
                match &arg.name {
                    Some(name) => named.push((name.clone(), value)),
                    None if !named.is_empty() => {
                        return Err(EvalError::new(
                            "positional arguments must come before named arguments",
                            arg.value.location,
                        ));
                    },
                    None => positional.push(value),
                }
            }
            call(scope, name, positional, named, location)
        },
        ExpressionKind::Lambda(definition) => Ok(Value::Function(Rc::new(Closure {
            definition: Rc::clone(definition),
            captured: scope.capture_locals(),
        }))),
        ExpressionKind::Unary { op, operand } => {
            let value = evaluate(scope, operand)?;
            apply_unary(*op, value, location)
        },
        ExpressionKind::Binary { op, left, right } => {
            let left = evaluate(scope, left)?;
            match (op, &left) {
                (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                _ => {},
            }
            let right = evaluate(scope, right)?;
            apply_binary(*op, left, right, location)
        },
        ExpressionKind::Assignment { target, value } => {
            let value = evaluate(scope, value)?;
            assign(scope, target, value)?;
            Ok(Value::Void)
        },
        ExpressionKind::FunctionDefinition(definition) => {
            debug!("defining function {}", definition.display_name());
            scope.define_function(Rc::clone(definition));
            Ok(Value::Void)
        },
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let taken = match evaluate(scope, condition)? {
                Value::Bool(b) => b,
                Value::Clause(_) => {
                    return Err(EvalError::new(
                        "if condition reads memory; conditions that change at runtime belong in a trigger",
                        condition.location,
                    )
                    .with_kind(EvalErrorKind::RuntimeLogicInCondition));
                },
                other => {
                    return Err(EvalError::new(
                        format!("if condition must be a boolean, found {}", other.type_name()),
                        condition.location,
                    ));
                },
            };
            let branch = if taken { Some(then_branch) } else { else_branch.as_ref() };
            if let Some(branch) = branch {
                let block = scope.child();
                execute_block(&block, branch)?;
            }
            Ok(Value::Void)
        },
        ExpressionKind::For {
            variable,
            iterable,
            body,
        } => {
            let iterable_value = evaluate(scope, iterable)?;
            let items: Box<dyn Iterator<Item = Value>> = match &iterable_value {
                Value::Range { start, end, step } => Box::new(RangeIter::new(*start, *end, *step).map(Value::Integer)),
                other => match other.iter_items() {
                    Some(items) => Box::new(items.into_iter()),
                    None => {
                        return Err(EvalError::new(
                            format!("cannot iterate over {}", other.type_name()),
                            iterable.location,
                        ));
                    },
                },
            };
            for item in items {
                let iteration = scope.child();
                iteration.define(variable, item);
                execute_block(&iteration, body)?;
                if iteration.is_complete() {
                    break;
                }
            }
            Ok(Value::Void)
        },
        ExpressionKind::Return(value) => {
            let value = match value {
                Some(value) => evaluate(scope, value)?,
                None => Value::Void,
            };
            if !scope.set_return(value) {
                return Err(EvalError::new("return used outside of a function", location));
            }
            Ok(Value::Void)
        },
    }
}

fn lookup_variable(scope: &Scope<'_>, name: &str, location: Location) -> Result<Value, EvalError> {
    if let Some(value) = scope.resolve_variable(name) {
        return Ok(value);
    }
    if let Some(definition) = scope.resolve_function(name) {
        return Ok(Value::Function(Rc::new(Closure {
            definition,
            captured: Vec::new(),
        })));
    }
    Err(EvalError::new(format!("unknown variable {name}"), location))
}

fn index_position(len: usize, index: &Value, location: Location) -> Result<usize, EvalError> {
    match index {
        Value::Integer(i) => usize::try_from(*i)
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| EvalError::new(format!("index {i} out of range (length {len})"), location)),
        other => Err(EvalError::new(
            format!("array index must be an integer, found {}", other.type_name()),
            location,
        )),
    }
}

fn read_index(container: &Value, index: &Value, location: Location) -> Result<Value, EvalError> {
    match container {
        Value::Array(items) => {
            let items = items.borrow();
            let position = index_position(items.len(), index, location)?;
            Ok(items[position].clone())
        },
        Value::Dictionary(entries) => entries
            .borrow()
            .iter()
            .find(|(key, _)| key.key_eq(index))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| EvalError::new(format!("no entry for key {index}"), location)),
        other => Err(EvalError::new(format!("cannot index into {}", other.type_name()), location)),
    }
}

fn assign(scope: &Scope<'_>, target: &Expression, value: Value) -> Result<(), EvalError> {
    match &target.kind {
        ExpressionKind::Variable(name) => {
            scope.assign(name, value);
            Ok(())
        },
        ExpressionKind::Index { target: container, index } => {
            let container = evaluate(scope, container)?;
            let index = evaluate(scope, index)?;
            match container {
                Value::Array(items) => {
                    let mut items = items.borrow_mut();
                    let position = index_position(items.len(), &index, target.location)?;
                    items[position] = value;
                    Ok(())
                },
                Value::Dictionary(entries) => {
                    let mut entries = entries.borrow_mut();
                    match entries.iter_mut().find(|(key, _)| key.key_eq(&index)) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((index, value)),
                    }
                    Ok(())
                },
                other => Err(EvalError::new(
                    format!("cannot assign into {}", other.type_name()),
                    target.location,
                )),
            }
        },
        _ => Err(EvalError::new("cannot assign to this expression", target.location)),
    }
}

/// Resolves `name` as a user function, a variable holding a function, or a
/// builtin, in that order.
fn call(
    scope: &Scope<'_>,
    name: &str,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    location: Location,
) -> Result<Value, EvalError> {
    if let Some(definition) = scope.resolve_function(name) {
        let closure = Closure {
            definition,
            captured: Vec::new(),
        };
        return call_function(scope, &closure, positional, named, location);
    }
    if let Some(Value::Function(closure)) = scope.resolve_variable(name) {
        return call_function(scope, &closure, positional, named, location);
    }
    match builtins::lookup(name) {
        Some(builtin) => builtins::invoke(scope, builtin, positional, named, location),
        None => Err(EvalError::new(format!("unknown function {name}"), location)),
    }
}

/// Binds arguments and runs the body of a script-defined function.
pub(crate) fn call_function(
    scope: &Scope<'_>,
    closure: &Closure,
    positional: Vec<Value>,
    mut named: Vec<(String, Value)>,
    location: Location,
) -> Result<Value, EvalError> {
    let definition = &closure.definition;
    let name = definition.display_name();
    let call_scope = scope
        .function_call(name)
        .ok_or_else(|| EvalError::new(format!("{name}: call depth exceeds {MAX_CALL_DEPTH}"), location))?;

    for (captured, value) in &closure.captured {
        call_scope.define(captured, value.clone());
    }
    if positional.len() > definition.params.len() {
        return Err(EvalError::new(
            format!(
                "{name} takes {} argument(s) but {} were given",
                definition.params.len(),
                positional.len()
            ),
            location,
        ));
    }

    let mut positional = positional.into_iter();
    for param in &definition.params {
        let by_name = named.iter().position(|(arg, _)| *arg == param.name);
        let value = match (positional.next(), by_name, &param.default) {
            (Some(value), None, _) => value,
            (Some(_), Some(_), _) => {
                return Err(EvalError::new(
                    format!("{name}: argument {} given twice", param.name),
                    location,
                ));
            },
            (None, Some(index), _) => named.remove(index).1,
            (None, None, Some(default)) => evaluate(&call_scope, default)?,
            (None, None, None) => {
                return Err(EvalError::new(
                    format!("{name}: missing required argument {}", param.name),
                    location,
                ));
            },
        };
        call_scope.define(&param.name, value);
    }
    if let Some((unknown, _)) = named.first() {
        return Err(EvalError::new(format!("{name} has no parameter {unknown}"), location));
    }

    execute_block(&call_scope, &definition.body)
        .map_err(|err| EvalError::wrap(format!("{name} call failed"), location, err))?;
    Ok(call_scope.take_return().unwrap_or_default())
}

pub(crate) fn apply_unary(op: UnaryOp, value: Value, location: Location) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, Value::Clause(clause)) => Ok(Value::clause(Clause::Not(Box::new(clause.as_ref().clone())))),
        (UnaryOp::Negate, Value::Integer(n)) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EvalError::new("integer overflow", location)),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Negate, Value::Clause(clause)) if clause.is_value() => Ok(Value::clause(Clause::math(
            RequirementOperator::Subtract,
            Clause::Constant(0),
            clause.as_ref().clone(),
        ))),
        (UnaryOp::Invert, Value::Integer(n)) => Ok(Value::Integer(!n & 0xFFFF_FFFF)),
        (UnaryOp::Invert, Value::Clause(clause)) => match clause.as_ref() {
            Clause::Memory(accessor) => accessor
                .with_kind(FieldKind::Invert, "~")
                .map(|inverted| Value::clause(Clause::Memory(inverted)))
                .map_err(|err| EvalError::compile(&err, location)),
            other => Err(EvalError::new(
                format!("~ can only invert a memory read, found {}", other.describe()),
                location,
            )),
        },
        (op, value) => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Negate => "-",
                UnaryOp::Invert => "~",
            };
            Err(EvalError::new(
                format!("cannot apply {symbol} to {}", value.type_name()),
                location,
            ))
        },
    }
}

fn requirement_operator(op: BinaryOp) -> RequirementOperator {
    match op {
        BinaryOp::Multiply => RequirementOperator::Multiply,
        BinaryOp::Divide => RequirementOperator::Divide,
        BinaryOp::Modulus => RequirementOperator::Modulus,
        BinaryOp::BitwiseAnd => RequirementOperator::BitwiseAnd,
        BinaryOp::BitwiseXor => RequirementOperator::BitwiseXor,
        BinaryOp::Add => RequirementOperator::Add,
        BinaryOp::Subtract => RequirementOperator::Subtract,
        BinaryOp::Equal => RequirementOperator::Equal,
        BinaryOp::NotEqual => RequirementOperator::NotEqual,
        BinaryOp::Less => RequirementOperator::LessThan,
        BinaryOp::LessEqual => RequirementOperator::LessThanOrEqual,
        BinaryOp::Greater => RequirementOperator::GreaterThan,
        BinaryOp::GreaterEqual => RequirementOperator::GreaterThanOrEqual,
        BinaryOp::And | BinaryOp::Or => RequirementOperator::None,
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value, location: Location) -> EvalError {
    EvalError::new(
        format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        location,
    )
}

pub(crate) fn apply_binary(op: BinaryOp, left: Value, right: Value, location: Location) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => integer_binary(op, *a, *b, location),
        #[allow(clippy::cast_precision_loss)]
        (Value::Float(_) | Value::Integer(_), Value::Float(_) | Value::Integer(_)) => {
            let as_float = |value: &Value| match value {
                Value::Float(f) => *f,
                Value::Integer(n) => *n as f64,
                _ => 0.0,
            };
            float_binary(op, as_float(&left), as_float(&right))
                .ok_or_else(|| mismatch(op, &left, &right, location))
        },
        (Value::String(a), _) if op == BinaryOp::Add => Ok(Value::String(format!("{a}{right}"))),
        (_, Value::String(b)) if op == BinaryOp::Add => Ok(Value::String(format!("{left}{b}"))),
        (Value::String(a), Value::String(b)) => op
            .is_comparison()
            .then(|| Value::Bool(requirement_operator(op).compare(a, b) == Some(true)))
            .ok_or_else(|| mismatch(op, &left, &right, location)),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(*a && *b)),
            BinaryOp::Or => Ok(Value::Bool(*a || *b)),
            BinaryOp::Equal => Ok(Value::Bool(a == b)),
            BinaryOp::NotEqual => Ok(Value::Bool(a != b)),
            _ => Err(mismatch(op, &left, &right, location)),
        },
        (Value::Clause(_), _) | (_, Value::Clause(_)) => clause_binary(op, &left, &right, location),
        _ => Err(mismatch(op, &left, &right, location)),
    }
}

fn integer_binary(op: BinaryOp, a: i64, b: i64, location: Location) -> Result<Value, EvalError> {
    let arithmetic = |result: Option<i64>| {
        result
            .map(Value::Integer)
            .ok_or_else(|| EvalError::new(format!("{a} {} {b} is undefined or overflows", op.symbol()), location))
    };
    match op {
        BinaryOp::Add => arithmetic(a.checked_add(b)),
        BinaryOp::Subtract => arithmetic(a.checked_sub(b)),
        BinaryOp::Multiply => arithmetic(a.checked_mul(b)),
        BinaryOp::Divide => arithmetic(a.checked_div(b)),
        BinaryOp::Modulus => arithmetic(a.checked_rem(b)),
        BinaryOp::BitwiseAnd => Ok(Value::Integer(a & b)),
        BinaryOp::BitwiseXor => Ok(Value::Integer(a ^ b)),
        BinaryOp::And | BinaryOp::Or => Err(EvalError::new(
            format!("{} needs boolean or condition operands, found integers", op.symbol()),
            location,
        )),
        comparison => Ok(Value::Bool(requirement_operator(comparison).compare(a, b) == Some(true))),
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    match op {
        BinaryOp::Add => Some(Value::Float(a + b)),
        BinaryOp::Subtract => Some(Value::Float(a - b)),
        BinaryOp::Multiply => Some(Value::Float(a * b)),
        BinaryOp::Divide if b != 0.0 => Some(Value::Float(a / b)),
        op if op.is_comparison() => Some(Value::Bool(requirement_operator(op).compare(a, b) == Some(true))),
        _ => None,
    }
}

/// Builds a clause when either side reads memory.
fn clause_binary(op: BinaryOp, left: &Value, right: &Value, location: Location) -> Result<Value, EvalError> {
    let (Some(l), Some(r)) = (left.to_clause(), right.to_clause()) else {
        return Err(mismatch(op, left, right, location));
    };
    match op {
        BinaryOp::And => Ok(Value::clause(Clause::and(l, r))),
        BinaryOp::Or => Ok(Value::clause(Clause::or(l, r))),
        _ if !l.is_value() || !r.is_value() => Err(EvalError::new(
            format!(
                "cannot apply {} to {} and {}; both sides must be values",
                op.symbol(),
                l.describe(),
                r.describe()
            ),
            location,
        )),
        comparison if comparison.is_comparison() => {
            Ok(Value::clause(Clause::compare(requirement_operator(comparison), l, r)))
        },
        arithmetic => Ok(Value::clause(Clause::math(requirement_operator(arithmetic), l, r))),
    }
}
