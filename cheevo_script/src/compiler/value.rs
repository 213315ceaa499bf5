//! Value compiler: lowers arithmetic into Measured requirement groups for
//! leaderboards and rich presence.

use cheevo_data::{Requirement, RequirementType, ValueExpression, optimize};
use log::debug;

use super::{compile_trigger_in, lower, math, normalize};
use crate::clause::Clause;
use crate::error::CompileError;
use crate::scope::{Scope, ScopeContext};

/// Compiles a value clause outside of any script run.
///
/// # Errors
/// Returns a [`CompileError`] when the clause cannot be represented.
pub fn compile_value(clause: &Clause) -> Result<ValueExpression, CompileError> {
    let root = Scope::root(ScopeContext::None);
    compile_value_in(&root, clause)
}

/// Compiles a value clause. `max_of(...)` produces one group per argument.
///
/// # Errors
/// Returns a [`CompileError`] when the clause cannot be represented.
pub fn compile_value_in(scope: &Scope<'_>, clause: &Clause) -> Result<ValueExpression, CompileError> {
    let builder = scope.with_context(ScopeContext::TriggerBuilder);
    let items = match clause {
        Clause::MaxOf(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let mut groups = vec![value_group(&builder, item)?];
        optimize(&mut groups, true)?;
        values.extend(groups);
    }
    debug!("value compiled into {} group(s)", values.len());
    Ok(ValueExpression { values })
}

/// The arithmetic being measured, with its `when=` condition.
struct Target<'c> {
    value: &'c Clause,
    when: Option<&'c Clause>,
    percent: bool,
}

fn value_group(scope: &Scope<'_>, clause: &Clause) -> Result<Vec<Requirement>, CompileError> {
    let parts = match clause {
        Clause::And(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut target: Option<Target<'_>> = None;
    let mut conditions = Clause::AlwaysTrue;
    for part in parts {
        let found = match part {
            value if value.is_value() => Some(Target {
                value,
                when: None,
                percent: false,
            }),
            Clause::Measured { clause, when, percent } if clause.is_value() => Some(Target {
                value: clause,
                when: when.as_deref(),
                percent: *percent,
            }),
            _ => None,
        };
        match found {
            Some(_) if target.is_some() => {
                return Err(CompileError::Unsupported {
                    construct: "more than one measured value",
                    context: "in a single value group",
                });
            },
            Some(found) => target = Some(found),
            None => conditions = Clause::and(conditions, part.clone()),
        }
    }

    let mut out = Vec::new();
    if conditions != Clause::AlwaysTrue {
        let trigger = compile_trigger_in(scope, &conditions)?;
        if !trigger.alts.is_empty() {
            return Err(CompileError::Unsupported {
                construct: "an || condition",
                context: "in a value",
            });
        }
        out.extend(trigger.core);
    }

    match target {
        Some(target) => {
            let kind = if target.percent {
                RequirementType::MeasuredPercent
            } else {
                RequirementType::Measured
            };
            let sum = math::sum_of(target.value)?;
            math::emit_accumulated(&sum, kind, &mut out)?;
            let when = target.when.map(normalize).transpose()?;
            out.extend(lower::measured_if(when.as_ref())?);
        },
        None if !out.iter().any(|req| req.kind.is_measured()) => flag_first_condition(&mut out)?,
        None => {},
    }
    pin_measured_counts(&mut out);
    Ok(out)
}

/// A value made only of conditions measures the first plain one.
fn flag_first_condition(group: &mut [Requirement]) -> Result<(), CompileError> {
    let terminator = group
        .iter_mut()
        .find(|req| req.kind == RequirementType::None)
        .ok_or_else(|| CompileError::NotAComparison("a value with nothing to measure".to_string()))?;
    terminator.kind = RequirementType::Measured;
    Ok(())
}

/// A measured comparison without a hit target counts without limit.
fn pin_measured_counts(group: &mut [Requirement]) {
    for requirement in group {
        if requirement.kind.is_measured() && requirement.is_comparison() && requirement.hit_count == 0 {
            requirement.hit_count = u32::MAX;
        }
    }
}
