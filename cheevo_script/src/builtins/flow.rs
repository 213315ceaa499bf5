//! Hit counting and flag builtins.

use cheevo_data::RequirementType;

use super::{Builtin, CallContext, DefaultArg, ParamSpec};
use crate::clause::Clause;
use crate::error::EvalError;
use crate::value::Value;

const COMPARISON: &[ParamSpec] = &[ParamSpec::required("comparison")];

macro_rules! flag {
    ($name:literal) => {
        Builtin {
            name: $name,
            params: COMPARISON,
            variadic: false,
            handler: flagged,
        }
    };
}

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "once",
        params: COMPARISON,
        variadic: false,
        handler: once,
    },
    Builtin {
        name: "repeated",
        params: &[ParamSpec::required("count"), ParamSpec::required("comparison")],
        variadic: false,
        handler: repeated,
    },
    Builtin {
        name: "tally",
        params: &[ParamSpec::required("count")],
        variadic: true,
        handler: tally,
    },
    Builtin {
        name: "deduct",
        params: COMPARISON,
        variadic: false,
        handler: deduct,
    },
    flag!("never"),
    flag!("unless"),
    flag!("trigger_when"),
    Builtin {
        name: "measured",
        params: &[
            ParamSpec::required("comparison"),
            ParamSpec::optional("when", DefaultArg::Void),
            ParamSpec::optional("format", DefaultArg::Str("raw")),
        ],
        variadic: false,
        handler: measured,
    },
    Builtin {
        name: "disable_when",
        params: &[
            ParamSpec::required("comparison"),
            ParamSpec::optional("until", DefaultArg::Void),
        ],
        variadic: false,
        handler: disable_when,
    },
    Builtin {
        name: "always_true",
        params: &[],
        variadic: false,
        handler: always_true,
    },
    Builtin {
        name: "always_false",
        params: &[],
        variadic: false,
        handler: always_false,
    },
    Builtin {
        name: "max_of",
        params: &[],
        variadic: true,
        handler: max_of,
    },
];

fn counted(ctx: &CallContext<'_>, count: u32) -> Result<Value, EvalError> {
    let clause = ctx.clause("comparison")?;
    Ok(Value::clause(Clause::Repeated {
        count,
        clause: Box::new(clause),
    }))
}

fn once(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    counted(ctx, 1)
}

fn repeated(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let count = ctx.unsigned("count")?;
    counted(ctx, count)
}

/// Array arguments are spread, so `tally(3, conditions)` works with a list.
fn tally(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let count = ctx.unsigned("count")?;
    let mut items = Vec::new();
    for arg in &ctx.rest {
        let values = match arg {
            Value::Array(values) => values.borrow().clone(),
            other => vec![other.clone()],
        };
        for value in values {
            let clause = value
                .to_clause()
                .ok_or_else(|| ctx.error(format!("cannot tally {}", value.type_name())))?;
            items.push(clause);
        }
    }
    if items.is_empty() {
        return Err(ctx.error("needs at least one condition"));
    }
    Ok(Value::clause(Clause::Tally { count, items }))
}

fn deduct(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let clause = ctx.clause("comparison")?;
    Ok(Value::clause(Clause::Deduct(Box::new(clause))))
}

/// `never`, `unless` and `trigger_when`. A constant false condition can never
/// fire, so it reduces to `true`.
fn flagged(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let flag = match ctx.builtin.name {
        "never" => RequirementType::ResetIf,
        "unless" => RequirementType::PauseIf,
        _ => RequirementType::Trigger,
    };
    let clause = ctx.clause("comparison")?;
    if flag != RequirementType::Trigger && clause == Clause::AlwaysFalse {
        return Ok(Value::Bool(true));
    }
    Ok(Value::clause(Clause::Flagged {
        flag,
        clause: Box::new(clause),
    }))
}

fn optional_clause(ctx: &CallContext<'_>, name: &str) -> Result<Option<Box<Clause>>, EvalError> {
    if ctx.is_void(name) {
        return Ok(None);
    }
    ctx.clause(name).map(|clause| Some(Box::new(clause)))
}

fn measured(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let percent = match ctx.string("format")?.as_str() {
        "raw" => false,
        "percent" => true,
        other => return Err(ctx.error(format!("format must be \"raw\" or \"percent\", found \"{other}\""))),
    };
    Ok(Value::clause(Clause::Measured {
        clause: Box::new(ctx.clause("comparison")?),
        when: optional_clause(ctx, "when")?,
        percent,
    }))
}

fn disable_when(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::clause(Clause::DisableWhen {
        clause: Box::new(ctx.clause("comparison")?),
        until: optional_clause(ctx, "until")?,
    }))
}

fn always_true(_ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::clause(Clause::AlwaysTrue))
}

fn always_false(_ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::clause(Clause::AlwaysFalse))
}

/// Each argument becomes one value group, so conditions are allowed too.
fn max_of(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let items = ctx
        .rest
        .iter()
        .map(|value| {
            value
                .to_clause()
                .ok_or_else(|| ctx.error(format!("cannot measure {}", value.type_name())))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Err(ctx.error("needs at least one value"));
    }
    Ok(Value::clause(Clause::MaxOf(items)))
}
