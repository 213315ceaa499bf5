//! Asset declarations: achievements, leaderboards and rich presence.

use std::cell::RefMut;

use log::info;

use super::collections::substitute;
use super::{Builtin, CallContext, DefaultArg, ParamSpec};
use crate::compiler::{compile_trigger_in, compile_value_in};
use crate::error::EvalError;
use crate::output::{Achievement, Leaderboard, RichPresenceDisplay, RichPresenceLookup, ScriptOutput};
use crate::value::Value;

/// Leaderboard and rich presence value formats.
const VALUE_FORMATS: &[&str] = &[
    "value",
    "score",
    "frames",
    "seconds",
    "centiseconds",
    "milliseconds",
    "minutes",
    "seconds_as_minutes",
    "float1",
    "float2",
    "float3",
    "unsigned",
];

const ACHIEVEMENT_TYPES: &[&str] = &["", "progression", "win_condition", "missable"];

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "achievement",
        params: &[
            ParamSpec::required("title"),
            ParamSpec::required("description"),
            ParamSpec::required("points"),
            ParamSpec::required("trigger"),
            ParamSpec::optional("id", DefaultArg::Int(0)),
            ParamSpec::optional("badge", DefaultArg::Str("0")),
            ParamSpec::optional("type", DefaultArg::Str("")),
        ],
        variadic: false,
        handler: achievement,
    },
    Builtin {
        name: "leaderboard",
        params: &[
            ParamSpec::required("title"),
            ParamSpec::required("description"),
            ParamSpec::required("start"),
            ParamSpec::required("cancel"),
            ParamSpec::required("submit"),
            ParamSpec::required("value"),
            ParamSpec::optional("format", DefaultArg::Str("value")),
            ParamSpec::optional("lower_is_better", DefaultArg::Bool(false)),
            ParamSpec::optional("id", DefaultArg::Int(0)),
        ],
        variadic: false,
        handler: leaderboard,
    },
    Builtin {
        name: "rich_presence_display",
        params: &[ParamSpec::required("format_string")],
        variadic: true,
        handler: rich_presence_display,
    },
    Builtin {
        name: "rich_presence_conditional_display",
        params: &[ParamSpec::required("condition"), ParamSpec::required("format_string")],
        variadic: true,
        handler: rich_presence_display,
    },
    Builtin {
        name: "rich_presence_value",
        params: &[
            ParamSpec::required("name"),
            ParamSpec::required("expression"),
            ParamSpec::optional("format", DefaultArg::Str("value")),
        ],
        variadic: false,
        handler: rich_presence_value,
    },
    Builtin {
        name: "rich_presence_lookup",
        params: &[
            ParamSpec::required("name"),
            ParamSpec::required("expression"),
            ParamSpec::required("dictionary"),
            ParamSpec::optional("fallback", DefaultArg::Str("")),
        ],
        variadic: false,
        handler: rich_presence_lookup,
    },
];

fn output<'a>(ctx: &'a CallContext<'_>) -> Result<RefMut<'a, ScriptOutput>, EvalError> {
    ctx.scope
        .interpreter()
        .map(|interpreter| interpreter.output.borrow_mut())
        .ok_or_else(|| ctx.error("assets can only be declared while running a script"))
}

fn trigger_arg(ctx: &CallContext<'_>, name: &str) -> Result<cheevo_data::Trigger, EvalError> {
    let clause = ctx.clause(name)?;
    compile_trigger_in(ctx.scope, &clause).map_err(|err| ctx.compile_error(&err))
}

fn value_format(ctx: &CallContext<'_>) -> Result<String, EvalError> {
    let format = ctx.string("format")?.to_lowercase();
    if !VALUE_FORMATS.contains(&format.as_str()) {
        return Err(ctx.error(format!("unknown format \"{format}\"")));
    }
    Ok(format)
}

fn achievement(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let title = ctx.string("title")?;
    let kind = ctx.string("type")?;
    if !ACHIEVEMENT_TYPES.contains(&kind.as_str()) {
        return Err(ctx.error(format!("unknown achievement type \"{kind}\"")));
    }
    let trigger = trigger_arg(ctx, "trigger")?;
    let achievement = Achievement {
        id: ctx.unsigned("id")?,
        description: ctx.string("description")?,
        points: ctx.unsigned("points")?,
        badge: match ctx.arg("badge") {
            Value::Integer(n) => n.to_string(),
            _ => ctx.string("badge")?,
        },
        kind,
        trigger,
        source_line: ctx.location.line,
        title,
    };
    info!(
        "achievement \"{}\" ({} points): {}",
        achievement.title, achievement.points, achievement.trigger
    );
    output(ctx)?.achievements.push(achievement);
    Ok(Value::Void)
}

fn leaderboard(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let value_clause = ctx.clause("value")?;
    let value = compile_value_in(ctx.scope, &value_clause).map_err(|err| ctx.compile_error(&err))?;
    let leaderboard = Leaderboard {
        id: ctx.unsigned("id")?,
        title: ctx.string("title")?,
        description: ctx.string("description")?,
        start: trigger_arg(ctx, "start")?,
        cancel: trigger_arg(ctx, "cancel")?,
        submit: trigger_arg(ctx, "submit")?,
        value,
        format: value_format(ctx)?,
        lower_is_better: ctx.bool("lower_is_better")?,
        source_line: ctx.location.line,
    };
    info!("leaderboard \"{}\": {}", leaderboard.title, leaderboard.definition());
    output(ctx)?.leaderboards.push(leaderboard);
    Ok(Value::Void)
}

/// Both display builtins; the conditional one has a `condition` parameter.
fn rich_presence_display(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let template = ctx.string("format_string")?;
    let text = substitute(ctx, &template, &ctx.rest)?;
    let condition = match ctx.builtin.params.first() {
        Some(param) if param.name == "condition" => Some(trigger_arg(ctx, "condition")?),
        _ => None,
    };
    info!("rich presence display: {text}");
    output(ctx)?
        .rich_presence
        .displays
        .push(RichPresenceDisplay { condition, text });
    Ok(Value::Void)
}

fn macro_value(ctx: &CallContext<'_>) -> Result<String, EvalError> {
    let clause = ctx.clause("expression")?;
    compile_value_in(ctx.scope, &clause)
        .map(|value| value.to_string())
        .map_err(|err| ctx.compile_error(&err))
}

/// Returns the `@Name(value)` macro text for use in a display string.
fn rich_presence_value(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let name = ctx.string("name")?;
    let format = value_format(ctx)?;
    let value = macro_value(ctx)?;
    output(ctx)?.rich_presence.add_format(&name, &format);
    Ok(Value::String(format!("@{name}({value})")))
}

fn rich_presence_lookup(ctx: &CallContext<'_>) -> Result<Value, EvalError> {
    let name = ctx.string("name")?;
    let value = macro_value(ctx)?;
    let Value::Dictionary(dictionary) = ctx.arg("dictionary") else {
        return Err(ctx.error("dictionary must map integers to strings"));
    };
    let mut entries = Vec::new();
    for (key, text) in dictionary.borrow().iter() {
        match key {
            Value::Integer(key) => entries.push((*key, text.to_string())),
            other => return Err(ctx.error(format!("lookup keys must be integers, found {}", other.type_name()))),
        }
    }
    output(ctx)?.rich_presence.add_lookup(RichPresenceLookup {
        name: name.clone(),
        entries,
        fallback: ctx.string("fallback")?,
    });
    Ok(Value::String(format!("@{name}({value})")))
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorCategory, EvalErrorKind};
    use crate::interpreter::Interpreter;
    use crate::output::ScriptOutput;
    use crate::parser::parse_program;

    fn run(source: &str) -> (ScriptOutput, Option<crate::error::EvalError>) {
        let program = parse_program(source).expect("parse");
        let interpreter = Interpreter::new();
        let result = interpreter.run(&program, None);
        (interpreter.into_output(), result.err())
    }

    #[test]
    fn achievement_records_trigger_and_line() {
        let (output, err) = run("\nachievement(\"Win\", \"Beat it\", 10, byte(0x1234) == 5, id=12)");
        assert!(err.is_none());
        let achievement = &output.achievements[0];
        assert_eq!(achievement.id, 12);
        assert_eq!(achievement.source_line, 2);
        assert_eq!(achievement.trigger.to_string(), "0xH001234=5");
    }

    #[test]
    fn compile_errors_are_wrapped_and_earlier_assets_kept() {
        let (output, err) = run(concat!(
            "achievement(\"A\", \"a\", 1, byte(1) == 1)\n",
            "achievement(\"B\", \"b\", 1, deduct(byte(2) == 1))\n",
        ));
        assert_eq!(output.achievements.len(), 1);
        let err = err.expect("second achievement fails");
        assert_eq!(err.message, "achievement call failed");
        assert_eq!(err.kind, EvalErrorKind::Compile(ErrorCategory::Unsupported));
        assert!(err.root_cause().message.contains("deduct()"));
    }

    #[test]
    fn leaderboard_compiles_every_part() {
        let (output, err) = run(
            "leaderboard(\"Fast\", \"d\", byte(1) == 1, byte(1) == 0, byte(2) == 1, byte(3) * 2, format=\"frames\", lower_is_better=true)",
        );
        assert!(err.is_none());
        assert_eq!(
            output.leaderboards[0].definition(),
            "STA:0xH000001=1::CAN:0xH000001=0::SUB:0xH000002=1::VAL:M:0xH000003*2"
        );
    }

    #[test]
    fn rich_presence_macros_and_displays() {
        let (output, err) = run(concat!(
            "stage = rich_presence_lookup(\"Stage\", byte(0x10), {1: \"Forest\", 2: \"Cave\"}, fallback=\"?\")\n",
            "rich_presence_conditional_display(byte(0x11) == 1, \"Boss fight in {0}\", stage)\n",
            "rich_presence_display(\"Exploring {0} with {1} lives\", stage, rich_presence_value(\"Lives\", byte(0x12)))\n",
        ));
        assert!(err.is_none());
        assert_eq!(
            output.rich_presence.script(),
            concat!(
                "Format:Lives\nFormatType=VALUE\n\n",
                "Lookup:Stage\n1=Forest\n2=Cave\n*=?\n\n",
                "Display:\n",
                "?0xH000011=1?Boss fight in @Stage(M:0xH000010)\n",
                "Exploring @Stage(M:0xH000010) with @Lives(M:0xH000012) lives\n",
            )
        );
    }
}
