//! Trigger and value compiler.
//!
//! Lowers the clause trees built by the interpreter into requirement groups:
//! 1. normalise (push negations inward, turn bare reads into `!= 0`)
//! 2. split the top-level AND into plain core clauses and OR lists
//! 3. cross-multiply the OR lists into alt groups ([`expand`])
//! 4. lower every clause into requirements ([`lower`], [`math`])
//! 5. hand the groups to the requirement optimizer
//!
//! Only the outermost compilation runs the cross-group optimizer passes;
//! nested ones are detected through the scope chain.

use cheevo_data::{MAX_EXPANSION_SIZE, RequirementType, Trigger, optimize};
use log::debug;

use crate::clause::Clause;
use crate::error::CompileError;
use crate::scope::{Scope, ScopeContext};

mod expand;
mod lower;
mod math;
mod value;

pub use value::{compile_value, compile_value_in};

/// Compiles `clause` into a trigger outside of any script run.
///
/// # Errors
/// Returns a [`CompileError`] when the clause cannot be represented.
pub fn compile_trigger(clause: &Clause) -> Result<Trigger, CompileError> {
    let root = Scope::root(ScopeContext::None);
    compile_trigger_in(&root, clause)
}

/// Compiles `clause` within `scope`. When another compilation is already in
/// progress further out, only per-group optimization runs.
///
/// # Errors
/// Returns a [`CompileError`] when the clause cannot be represented.
pub fn compile_trigger_in(scope: &Scope<'_>, clause: &Clause) -> Result<Trigger, CompileError> {
    let builder = scope.with_context(ScopeContext::TriggerBuilder);
    let nested = !is_outermost_builder(&builder);
    let mut groups = build_groups(clause)?;
    optimize(&mut groups, nested)?;
    Ok(Trigger::from_groups(groups))
}

fn is_outermost_builder(scope: &Scope<'_>) -> bool {
    let outermost = scope.get_outermost_context(|context| match context {
        ScopeContext::TriggerBuilder => Some(context),
        _ => None,
    });
    outermost.is_some_and(|context| std::ptr::eq(context, scope.context()))
}

/// Raw core and alt groups for `clause`, before optimization.
fn build_groups(clause: &Clause) -> Result<Vec<Vec<cheevo_data::Requirement>>, CompileError> {
    let normalized = normalize(clause)?;
    let parts = match normalized {
        Clause::And(items) => items,
        other => vec![other],
    };

    let mut core = Vec::new();
    let mut or_lists = Vec::new();
    for part in parts {
        match part {
            Clause::Or(items) => or_lists.push(flatten_or(items)?),
            other => core.push(other),
        }
    }

    let alts = expand::cross_multiply(or_lists, &mut core)?;
    debug!("trigger has {} core clauses and {} alt groups", core.len(), alts.len());

    let mut groups = Vec::with_capacity(alts.len() + 1);
    groups.push(lower::lower_group(&core)?);
    for alt in &alts {
        groups.push(lower::lower_group(alt)?);
    }
    Ok(groups)
}

/// Flattens nested ORs into one list of disjuncts. An AND holding an OR is
/// distributed (`a && (b || c)` becomes `a && b`, `a && c`), one OR at a time
/// through an explicit worklist. Only distribution is capped here; a long
/// list of simple disjuncts may still collapse into an OrNext chain later.
fn flatten_or(items: Vec<Clause>) -> Result<Vec<Clause>, CompileError> {
    let mut output = Vec::new();
    let mut distributed = 0usize;
    let mut pending: Vec<Clause> = items.into_iter().rev().collect();
    while let Some(clause) = pending.pop() {
        match clause {
            Clause::Or(inner) => pending.extend(inner.into_iter().rev()),
            Clause::And(children) if children.iter().any(|child| matches!(child, Clause::Or(_))) => {
                let Some(index) = children.iter().position(|child| matches!(child, Clause::Or(_))) else {
                    continue;
                };
                let Clause::Or(options) = &children[index] else {
                    continue;
                };
                for option in options.iter().rev() {
                    let mut combination = children.clone();
                    combination[index] = option.clone();
                    let rebuilt = combination.into_iter().fold(Clause::AlwaysTrue, Clause::and);
                    pending.push(rebuilt);
                }
                distributed = distributed.saturating_add(options.len());
                if distributed > MAX_EXPANSION_SIZE {
                    return Err(CompileError::ExpansionLimit {
                        projected: output.len() + pending.len(),
                        limit: MAX_EXPANSION_SIZE,
                    });
                }
            },
            other => output.push(other),
        }
    }
    Ok(output)
}

/// Rewrites a condition so that negations only remain inside comparisons and
/// every leaf is a comparison or a flow construct.
pub(crate) fn normalize(clause: &Clause) -> Result<Clause, CompileError> {
    match clause {
        Clause::Constant(value) => Err(CompileError::NotAComparison(format!("the integer {value}"))),
        Clause::Float(value) => Err(CompileError::NotAComparison(format!("the float {value}"))),
        Clause::Memory(_) | Clause::Math { .. } => Ok(Clause::compare(
            cheevo_data::RequirementOperator::NotEqual,
            clause.clone(),
            Clause::Constant(0),
        )),
        Clause::Compare { op, left, right } => normalize_compare(*op, left, right),
        Clause::And(items) => items
            .iter()
            .try_fold(Clause::AlwaysTrue, |acc, item| Ok(Clause::and(acc, normalize(item)?))),
        Clause::Or(items) => items
            .iter()
            .try_fold(Clause::AlwaysFalse, |acc, item| Ok(Clause::or(acc, normalize(item)?))),
        Clause::Not(inner) => negate(inner),
        Clause::Repeated { count, clause } => Ok(Clause::Repeated {
            count: *count,
            clause: Box::new(normalize(clause)?),
        }),
        Clause::Tally { count, items } => Ok(Clause::Tally {
            count: *count,
            items: items.iter().map(normalize).collect::<Result<_, _>>()?,
        }),
        Clause::Deduct(inner) => Ok(Clause::Deduct(Box::new(normalize(inner)?))),
        Clause::Flagged { flag, clause } => Ok(Clause::Flagged {
            flag: *flag,
            clause: Box::new(normalize(clause)?),
        }),
        Clause::Measured { clause, when, percent } => Ok(Clause::Measured {
            clause: Box::new(normalize(clause)?),
            when: when.as_deref().map(normalize).transpose()?.map(Box::new),
            percent: *percent,
        }),
        Clause::DisableWhen { clause, until } => Ok(Clause::DisableWhen {
            clause: Box::new(normalize(clause)?),
            until: until.as_deref().map(normalize).transpose()?.map(Box::new),
        }),
        Clause::MaxOf(_) => Err(CompileError::Unsupported {
            construct: "max_of()",
            context: "in a trigger",
        }),
        Clause::AlwaysTrue | Clause::AlwaysFalse => Ok(clause.clone()),
    }
}

fn normalize_compare(op: cheevo_data::RequirementOperator, left: &Clause, right: &Clause) -> Result<Clause, CompileError> {
    for side in [left, right] {
        if !side.is_value() {
            return Err(CompileError::NotAComparison(format!("{} used as a comparison operand", side.describe())));
        }
    }
    if let (Clause::Constant(l), Clause::Constant(r)) = (left, right) {
        return Ok(match op.compare(l, r) {
            Some(true) => Clause::AlwaysTrue,
            _ => Clause::AlwaysFalse,
        });
    }
    Ok(Clause::compare(op, left.clone(), right.clone()))
}

fn negate(clause: &Clause) -> Result<Clause, CompileError> {
    match clause {
        Clause::Constant(_) | Clause::Float(_) => normalize(clause),
        Clause::Memory(_) | Clause::Math { .. } => Ok(Clause::compare(
            cheevo_data::RequirementOperator::Equal,
            clause.clone(),
            Clause::Constant(0),
        )),
        Clause::Compare { op, left, right } => normalize_compare(op.opposite(), left, right),
        Clause::And(items) => items
            .iter()
            .try_fold(Clause::AlwaysFalse, |acc, item| Ok(Clause::or(acc, negate(item)?))),
        Clause::Or(items) => items
            .iter()
            .try_fold(Clause::AlwaysTrue, |acc, item| Ok(Clause::and(acc, negate(item)?))),
        Clause::Not(inner) => normalize(inner),
        Clause::AlwaysTrue => Ok(Clause::AlwaysFalse),
        Clause::AlwaysFalse => Ok(Clause::AlwaysTrue),
        other => Err(CompileError::Unsupported {
            construct: other.describe(),
            context: "inside a negation",
        }),
    }
}

/// Script name of a requirement flag, for error messages.
pub(crate) fn flag_name(flag: RequirementType) -> &'static str {
    match flag {
        RequirementType::ResetIf => "never()",
        RequirementType::PauseIf => "unless()",
        RequirementType::Trigger => "trigger_when()",
        RequirementType::Measured | RequirementType::MeasuredPercent => "measured()",
        RequirementType::MeasuredIf => "measured(when=)",
        RequirementType::ResetNextIf => "never() in repeated()",
        RequirementType::AddHits | RequirementType::SubHits => "tally()",
        RequirementType::AndNext => "&&",
        RequirementType::OrNext => "||",
        _ => "a condition",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::MemoryAccessor;
    use cheevo_data::{Field, FieldSize, RequirementOperator};

    fn byte(address: u32) -> Clause {
        Clause::Memory(MemoryAccessor::new(Field::memory(FieldSize::Byte, address)))
    }

    fn eq(address: u32, value: i64) -> Clause {
        Clause::compare(RequirementOperator::Equal, byte(address), Clause::Constant(value))
    }

    #[test]
    fn negation_is_pushed_into_comparisons() {
        let clause = Clause::Not(Box::new(Clause::and(eq(1, 1), Clause::or(eq(2, 2), byte(3)))));
        let normalized = normalize(&clause).expect("normalize");
        let expected = Clause::or(
            Clause::compare(RequirementOperator::NotEqual, byte(1), Clause::Constant(1)),
            Clause::and(
                Clause::compare(RequirementOperator::NotEqual, byte(2), Clause::Constant(2)),
                Clause::compare(RequirementOperator::Equal, byte(3), Clause::Constant(0)),
            ),
        );
        assert_eq!(normalized, expected);
    }

    #[test]
    fn integers_are_not_conditions() {
        let err = normalize(&Clause::and(eq(1, 1), Clause::Constant(3))).expect_err("integer");
        assert!(matches!(err, CompileError::NotAComparison(_)));
    }

    #[test]
    fn negated_flow_is_unsupported() {
        let clause = Clause::Not(Box::new(Clause::Repeated {
            count: 2,
            clause: Box::new(eq(1, 1)),
        }));
        assert!(matches!(normalize(&clause), Err(CompileError::Unsupported { .. })));
    }

    #[test]
    fn nested_or_inside_and_is_distributed() {
        let flattened = flatten_or(vec![eq(1, 1), Clause::and(eq(2, 2), Clause::or(eq(3, 3), eq(4, 4)))])
            .expect("flatten");
        assert_eq!(
            flattened,
            vec![
                eq(1, 1),
                Clause::And(vec![eq(2, 2), eq(3, 3)]),
                Clause::And(vec![eq(2, 2), eq(4, 4)]),
            ]
        );
    }

    #[test]
    fn long_simple_lists_collapse_instead_of_failing() {
        let long = Clause::Or((0..10_001).map(|address| eq(address, 1)).collect());
        let short = Clause::Or(vec![eq(0x20000, 1), eq(0x20001, 2)]);
        let trigger = compile_trigger(&Clause::And(vec![long, short])).expect("compile");
        assert_eq!(trigger.alts.len(), 2);
        let or_next = trigger
            .core
            .iter()
            .filter(|req| req.kind == RequirementType::OrNext)
            .count();
        assert_eq!(or_next, 10_000);
    }

    #[test]
    fn distribution_is_capped() {
        let wide = Clause::Or((0..200).map(|address| eq(address, 1)).collect());
        let product = Clause::And(vec![wide.clone(), wide, eq(0x1000, 1)]);
        let err = flatten_or(vec![product, eq(0x2000, 1)]).expect_err("too wide");
        assert!(matches!(err, CompileError::ExpansionLimit { .. }));
    }

    #[test]
    fn single_comparison_compiles_to_core() {
        let trigger = compile_trigger(&eq(0x1234, 5)).expect("compile");
        assert_eq!(trigger.to_string(), "0xH001234=5");
    }

    #[test]
    fn nested_compilation_skips_cross_group_passes() {
        let root = Scope::root(ScopeContext::None);
        let outer = root.with_context(ScopeContext::TriggerBuilder);
        assert!(is_outermost_builder(&outer));
        let inner = outer.with_context(ScopeContext::TriggerBuilder);
        assert!(!is_outermost_builder(&inner));
    }
}
