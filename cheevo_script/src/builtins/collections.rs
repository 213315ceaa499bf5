//! Array, dictionary and string helpers.

use std::fmt::Write as _;

use super::{Builtin, CallContext, DefaultArg, ParamSpec};
use crate::ast::{BinaryOp, UnaryOp};
use crate::error::EvalError;
use crate::interpreter::{apply_binary, apply_unary};
use crate::value::{RangeIter, Value};

const INPUT_PREDICATE: &[ParamSpec] = &[ParamSpec::required("input"), ParamSpec::required("predicate")];

macro_rules! over_input {
    ($name:literal, $handler:ident) => {
        Builtin {
            name: $name,
            params: INPUT_PREDICATE,
            variadic: false,
            handler: $handler,
        }
    };
}

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "range",
        params: &[
            ParamSpec::required("start"),
            ParamSpec::required("end"),
            ParamSpec::optional("step", DefaultArg::Int(1)),
        ],
        variadic: false,
        handler: range,
    },
    Builtin {
        name: "length",
        params: &[ParamSpec::required("object")],
        variadic: false,
        handler: length,
    },
    Builtin {
        name: "array_push",
        params: &[ParamSpec::required("array"), ParamSpec::required("value")],
        variadic: false,
        handler: array_push,
    },
    Builtin {
        name: "array_pop",
        params: &[ParamSpec::required("array")],
        variadic: false,
        handler: array_pop,
    },
    over_input!("array_map", array_map),
    over_input!("array_filter", array_filter),
    over_input!("any_of", any_of),
    over_input!("all_of", all_of),
    over_input!("none_of", none_of),
    over_input!("sum_of", sum_of),
    Builtin {
        name: "dictionary_contains_key",
        params: &[ParamSpec::required("dictionary"), ParamSpec::required("key")],
        variadic: false,
        handler: dictionary_contains_key,
    },
    Builtin {
        name: "format",
        params: &[ParamSpec::required("format_string")],
        variadic: true,
        handler: format,
    },
];

fn range(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let step = ctx.integer("step")?;
    if step == 0 {
        return Err(ctx.error("step must not be zero"));
    }
    Ok(Value::Range {
        start: ctx.integer("start")?,
        end: ctx.integer("end")?,
        step,
    })
}

fn length(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let len = match ctx.arg("object") {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Dictionary(entries) => entries.borrow().len(),
        Value::Range { start, end, step } => RangeIter::new(*start, *end, *step).count(),
        other => return Err(ctx.error(format!("cannot measure the length of {}", other.type_name()))),
    };
    i64::try_from(len)
        .map(Value::Integer)
        .map_err(|_| ctx.error("length does not fit in an integer"))
}

fn array_push(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    match ctx.arg("array") {
        Value::Array(items) => {
            items.borrow_mut().push(ctx.arg("value").clone());
            Ok(Value::Void)
        },
        other => Err(ctx.error(format!("expected an array, found {}", other.type_name()))),
    }
}

fn array_pop(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    match ctx.arg("array") {
        Value::Array(items) => Ok(items.borrow_mut().pop().unwrap_or_default()),
        other => Err(ctx.error(format!("expected an array, found {}", other.type_name()))),
    }
}

fn input_items(ctx: &CallContext<'_>) -> Result<Vec<Value>, EvalError> {
    let input = ctx.arg("input");
    input
        .iter_items()
        .ok_or_else(|| ctx.error(format!("cannot iterate over {}", input.type_name())))
}

fn predicate(ctx: &CallContext<'_>, item: Value) -> Result<Value, EvalError> {
    ctx.call(ctx.arg("predicate"), vec![item])
}

fn array_map(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let mapped = input_items(ctx)?
        .into_iter()
        .map(|item| predicate(ctx, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(mapped))
}

fn array_filter(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let mut kept = Vec::new();
    for item in input_items(ctx)? {
        match predicate(ctx, item.clone())? {
            Value::Bool(true) => kept.push(item),
            Value::Bool(false) => {},
            other => {
                return Err(ctx.error(format!("predicate must return a boolean, found {}", other.type_name())));
            },
        }
    }
    Ok(Value::array(kept))
}

/// Folds predicate results with `op`, so memory conditions build a clause
/// and constant ones fold to a boolean.
fn fold(ctx: &CallContext<'_>, op: BinaryOp, initial: Value, negate: bool) -> Result<Value, EvalError> {
    let mut acc = initial;
    for item in input_items(ctx)? {
        let mut result = predicate(ctx, item)?;
        if negate {
            result = apply_unary(UnaryOp::Not, result, ctx.location)?;
        }
        acc = apply_binary(op, acc, result, ctx.location)?;
    }
    Ok(acc)
}

fn any_of(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    fold(ctx, BinaryOp::Or, Value::Bool(false), false)
}

fn all_of(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    fold(ctx, BinaryOp::And, Value::Bool(true), false)
}

fn none_of(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    fold(ctx, BinaryOp::And, Value::Bool(true), true)
}

fn sum_of(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    fold(ctx, BinaryOp::Add, Value::Integer(0), false)
}

fn dictionary_contains_key(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    match ctx.arg("dictionary") {
        Value::Dictionary(entries) => {
            let key = ctx.arg("key");
            Ok(Value::Bool(entries.borrow().iter().any(|(existing, _)| existing.key_eq(key))))
        },
        other => Err(ctx.error(format!("expected a dictionary, found {}", other.type_name()))),
    }
}

fn format(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let template = ctx.string("format_string")?;
    substitute(ctx, &template, &ctx.rest).map(Value::String)
}

/// Replaces `{N}` in `template` with the N-th of `args`.
pub(super) fn substitute(ctx: &CallContext<'_>, template: &str, args: &[Value]) -> Result<String, EvalError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(ctx.error("unterminated placeholder"));
        };
        let index: usize = after[..close]
            .trim()
            .parse()
            .map_err(|_| ctx.error(format!("invalid placeholder {{{}}}", &after[..close])))?;
        let value = args
            .get(index)
            .ok_or_else(|| ctx.error(format!("no argument for placeholder {{{index}}}")))?;
        let _ = write!(out, "{value}");
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::clause::Clause;
    use crate::interpreter::evaluate;
    use crate::parser::{parse_expression, parse_program};
    use crate::scope::{InterpreterContext, Scope, ScopeContext};
    use crate::value::Value;

    fn eval(source: &str) -> Value {
        let root = Scope::root(ScopeContext::Interpreter(InterpreterContext::default()));
        evaluate(&root, &parse_expression(source).expect("parse")).expect("evaluate")
    }

    #[test]
    fn ranges_are_inclusive() {
        assert_eq!(eval("length(range(1, 10))"), Value::Integer(10));
        assert_eq!(eval("length(range(10, 1, -3))"), Value::Integer(4));
    }

    #[test]
    fn map_and_filter_call_lambdas() {
        assert_eq!(eval("array_map([1, 2, 3], x => x * 2)").to_string(), "[2, 4, 6]");
        assert_eq!(eval("array_filter(range(1, 6), x => x % 2 == 0)").to_string(), "[2, 4, 6]");
    }

    #[test]
    fn any_of_builds_an_or_of_conditions() {
        let Value::Clause(clause) = eval("any_of([1, 2, 3], a => byte(a) == 0)") else {
            panic!("expected clause");
        };
        assert!(matches!(clause.as_ref(), Clause::Or(items) if items.len() == 3));
    }

    #[test]
    fn constant_predicates_fold() {
        assert_eq!(eval("all_of([1, 2], x => x > 0)"), Value::Bool(true));
        assert_eq!(eval("none_of([1, 2], x => x > 1)"), Value::Bool(false));
        assert_eq!(eval("sum_of([1, 2, 3], x => x)"), Value::Integer(6));
    }

    #[test]
    fn format_substitutes_placeholders() {
        assert_eq!(
            eval("format(\"{0} scored {1}, {0} wins\", \"p1\", 10)"),
            Value::String("p1 scored 10, p1 wins".into())
        );
    }

    #[test]
    fn push_and_pop_share_the_array() {
        let program = parse_program("a = [1]\narray_push(a, 2)\nb = array_pop(a)\nc = length(a)").expect("parse");
        let root = Scope::root(ScopeContext::Interpreter(InterpreterContext::default()));
        for statement in &program {
            evaluate(&root, statement).expect("evaluate");
        }
        assert_eq!(root.resolve_variable("b"), Some(Value::Integer(2)));
        assert_eq!(root.resolve_variable("c"), Some(Value::Integer(1)));
        assert_eq!(
            eval("dictionary_contains_key({1: \"a\"}, 1)"),
            Value::Bool(true)
        );
    }
}
