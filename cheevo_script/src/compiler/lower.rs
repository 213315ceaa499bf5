//! Lowering of normalized clauses into flat requirement lists.

use cheevo_data::{Requirement, RequirementType};

use super::{flag_name, math};
use crate::clause::Clause;
use crate::error::CompileError;

/// Lowers the clauses of one core or alt group.
pub(super) fn lower_group(clauses: &[Clause]) -> Result<Vec<Requirement>, CompileError> {
    let mut out = Vec::new();
    for clause in clauses {
        lower_clause(clause, &mut out)?;
    }
    Ok(out)
}

fn lower_clause(clause: &Clause, out: &mut Vec<Requirement>) -> Result<(), CompileError> {
    match clause {
        Clause::And(items) => {
            for item in items {
                lower_clause(item, out)?;
            }
        },
        Clause::Repeated { count, clause } => out.extend(counted(*count, clause)?),
        Clause::Tally { count, items } => out.extend(tally(*count, items)?),
        Clause::Flagged { flag, clause } => out.extend(flagged(*flag, clause)?),
        Clause::Measured { clause, when, percent } => out.extend(measured(clause, when.as_deref(), *percent)?),
        Clause::DisableWhen { clause, until } => out.extend(disable_when(clause, until.as_deref())?),
        Clause::Deduct(_) => {
            return Err(CompileError::Unsupported {
                construct: "deduct()",
                context: "outside of tally()",
            });
        },
        other => out.extend(condition_chain(other)?),
    }
    Ok(())
}

/// A single clause: one terminator, optionally fed by AndNext/OrNext and
/// AddSource chains.
pub(super) fn condition_chain(clause: &Clause) -> Result<Vec<Requirement>, CompileError> {
    match clause {
        Clause::AlwaysTrue => Ok(vec![Requirement::always_true()]),
        Clause::AlwaysFalse => Ok(vec![Requirement::always_false()]),
        Clause::Compare { op, left, right } => math::compare(*op, left, right),
        Clause::And(items) => logical_chain(RequirementType::AndNext, items),
        Clause::Or(items) => logical_chain(RequirementType::OrNext, items),
        Clause::Repeated { .. }
        | Clause::Tally { .. }
        | Clause::Deduct(_)
        | Clause::Flagged { .. }
        | Clause::Measured { .. }
        | Clause::DisableWhen { .. }
        | Clause::MaxOf(_) => Err(CompileError::Unsupported {
            construct: clause.describe(),
            context: "inside a combined && or || condition",
        }),
        other => Err(CompileError::NotAComparison(other.describe().to_string())),
    }
}

fn is_compound(chain: &[Requirement]) -> bool {
    chain
        .iter()
        .any(|req| matches!(req.kind, RequirementType::AndNext | RequirementType::OrNext))
}

/// Joins `items` with `kind`. At most one item may itself be a chain; it is
/// emitted first so the runtime evaluates it as a unit.
fn logical_chain(kind: RequirementType, items: &[Clause]) -> Result<Vec<Requirement>, CompileError> {
    let mut chains = items.iter().map(condition_chain).collect::<Result<Vec<_>, _>>()?;
    if chains.iter().filter(|chain| is_compound(chain)).count() > 1 {
        return Err(CompileError::Unsupported {
            construct: "more than one nested && or ||",
            context: "in a single condition",
        });
    }
    if let Some(index) = chains.iter().position(|chain| is_compound(chain)) {
        let compound = chains.remove(index);
        chains.insert(0, compound);
    }

    let last = chains.len().saturating_sub(1);
    let mut out = Vec::new();
    for (index, mut chain) in chains.into_iter().enumerate() {
        if index != last {
            set_terminator(&mut chain, |req| req.kind = kind);
        }
        out.extend(chain);
    }
    Ok(out)
}

fn set_terminator(chain: &mut [Requirement], update: impl FnOnce(&mut Requirement)) {
    if let Some(terminator) = chain.last_mut() {
        update(terminator);
    }
}

/// `once`/`repeated`. `never()` parts become a ResetNextIf ahead of the
/// counted chain. A count of zero means "no target".
pub(super) fn counted(count: u32, inner: &Clause) -> Result<Vec<Requirement>, CompileError> {
    let parts = match inner {
        Clause::And(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut resets = Vec::new();
    let mut body = Clause::AlwaysTrue;
    for part in parts {
        match part {
            Clause::Flagged {
                flag: RequirementType::ResetIf,
                clause,
            } => resets.push(clause.as_ref().clone()),
            Clause::Flagged { flag, .. } => {
                return Err(CompileError::Unsupported {
                    construct: flag_name(*flag),
                    context: "inside once() or repeated()",
                });
            },
            Clause::Repeated { .. } | Clause::Tally { .. } => {
                return Err(CompileError::Unsupported {
                    construct: part.describe(),
                    context: "inside once() or repeated()",
                });
            },
            other => body = Clause::and(body, other.clone()),
        }
    }

    let mut out = Vec::new();
    if !resets.is_empty() {
        let reset = resets.into_iter().fold(Clause::AlwaysFalse, Clause::or);
        let mut chain = condition_chain(&reset)?;
        set_terminator(&mut chain, |req| req.kind = RequirementType::ResetNextIf);
        out.extend(chain);
    }
    let mut chain = condition_chain(&body)?;
    let target = if count == 0 { u32::MAX } else { count };
    set_terminator(&mut chain, |req| req.hit_count = target);
    out.extend(chain);
    Ok(out)
}

/// A clause with its own hit target, as allowed inside `tally()` and flags.
fn hit_chain(clause: &Clause) -> Result<Vec<Requirement>, CompileError> {
    match clause {
        Clause::Repeated { count, clause } => counted(*count, clause),
        other => condition_chain(other),
    }
}

/// `tally(N, items...)`: each item feeds AddHits (SubHits for `deduct`).
/// A trailing plain item closes the chain with target N; otherwise an
/// `always_false()` terminator carries it.
pub(super) fn tally(count: u32, items: &[Clause]) -> Result<Vec<Requirement>, CompileError> {
    let target = if count == 0 { u32::MAX } else { count };
    let mut out = Vec::new();
    let terminating = items
        .last()
        .filter(|item| !matches!(item, Clause::Deduct(_) | Clause::Repeated { .. }))
        .map(|_| items.len() - 1);

    for (index, item) in items.iter().enumerate() {
        let (kind, inner) = match item {
            Clause::Deduct(inner) => (RequirementType::SubHits, inner.as_ref()),
            other => (RequirementType::AddHits, other),
        };
        let mut chain = hit_chain(inner)?;
        if Some(index) == terminating {
            set_terminator(&mut chain, |req| req.hit_count = target);
        } else {
            set_terminator(&mut chain, |req| req.kind = kind);
        }
        out.extend(chain);
    }
    if terminating.is_none() {
        out.push(Requirement::always_false().with_hits(target));
    }
    Ok(out)
}

/// `never`, `unless` and `trigger_when`.
pub(super) fn flagged(flag: RequirementType, clause: &Clause) -> Result<Vec<Requirement>, CompileError> {
    match clause {
        Clause::Flagged { flag: existing, clause } if *existing == flag => flagged(flag, clause),
        Clause::Flagged { flag: existing, .. } => Err(CompileError::ConflictingFlags {
            applied: flag_name(flag),
            existing: flag_name(*existing),
        }),
        Clause::Or(items) if flag != RequirementType::Trigger => {
            let mut out = Vec::new();
            for item in items {
                out.extend(flagged(flag, item)?);
            }
            Ok(out)
        },
        Clause::And(items) if flag == RequirementType::Trigger => {
            let mut out = Vec::new();
            for item in items {
                out.extend(flagged(flag, item)?);
            }
            Ok(out)
        },
        Clause::Tally { count, items } => {
            let mut chain = tally(*count, items)?;
            set_terminator(&mut chain, |req| req.kind = flag);
            Ok(chain)
        },
        Clause::Measured { .. } | Clause::DisableWhen { .. } => Err(CompileError::Unsupported {
            construct: clause.describe(),
            context: "inside never(), unless() or trigger_when()",
        }),
        other => {
            let mut chain = hit_chain(other)?;
            set_terminator(&mut chain, |req| req.kind = flag);
            Ok(chain)
        },
    }
}

/// `measured(X, when=Y)`: X's terminator becomes Measured (or
/// MeasuredPercent) and each AND'd part of Y a MeasuredIf.
pub(super) fn measured(clause: &Clause, when: Option<&Clause>, percent: bool) -> Result<Vec<Requirement>, CompileError> {
    let kind = if percent {
        RequirementType::MeasuredPercent
    } else {
        RequirementType::Measured
    };
    let mut out = match clause {
        Clause::Tally { count, items } => tally(*count, items)?,
        other => hit_chain(other)?,
    };
    set_terminator(&mut out, |req| req.kind = kind);
    out.extend(measured_if(when)?);
    Ok(out)
}

pub(super) fn measured_if(when: Option<&Clause>) -> Result<Vec<Requirement>, CompileError> {
    let parts = match when {
        None => return Ok(Vec::new()),
        Some(Clause::And(items)) => items.as_slice(),
        Some(other) => std::slice::from_ref(other),
    };
    let mut out = Vec::new();
    for part in parts {
        let mut chain = condition_chain(part)?;
        set_terminator(&mut chain, |req| req.kind = RequirementType::MeasuredIf);
        out.extend(chain);
    }
    Ok(out)
}

/// `disable_when(X, until=Y)`: `Z:Y` resets the pause counter, `P:X.N.`
/// pauses once X has been true N times. A tally keeps its AddHits chain in
/// front of the PauseIf.
pub(super) fn disable_when(clause: &Clause, until: Option<&Clause>) -> Result<Vec<Requirement>, CompileError> {
    let mut out = Vec::new();
    if let Some(until) = until {
        let mut chain = condition_chain(until)?;
        set_terminator(&mut chain, |req| req.kind = RequirementType::ResetNextIf);
        out.extend(chain);
    }
    let mut chain = match clause {
        Clause::Repeated { .. } => hit_chain(clause)?,
        Clause::Tally { count, items } => tally(*count, items)?,
        other => {
            let mut chain = condition_chain(other)?;
            set_terminator(&mut chain, |req| req.hit_count = 1);
            chain
        },
    };
    set_terminator(&mut chain, |req| req.kind = RequirementType::PauseIf);
    out.extend(chain);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::MemoryAccessor;
    use cheevo_data::{Field, FieldSize, RequirementOperator};

    fn eq(address: u32, value: i64) -> Clause {
        Clause::compare(
            RequirementOperator::Equal,
            Clause::Memory(MemoryAccessor::new(Field::memory(FieldSize::Byte, address))),
            Clause::Constant(value),
        )
    }

    fn serialized(requirements: &[Requirement]) -> String {
        requirements.iter().map(ToString::to_string).collect::<Vec<_>>().join("_")
    }

    fn lowered(clause: &Clause) -> String {
        serialized(&lower_group(std::slice::from_ref(clause)).expect("lower"))
    }

    fn flag(flag: RequirementType, clause: Clause) -> Clause {
        Clause::Flagged {
            flag,
            clause: Box::new(clause),
        }
    }

    fn repeated(count: u32, clause: Clause) -> Clause {
        Clause::Repeated {
            count,
            clause: Box::new(clause),
        }
    }

    #[test]
    fn or_inside_a_flag_is_split() {
        let clause = flag(RequirementType::ResetIf, Clause::or(eq(1, 1), eq(2, 2)));
        assert_eq!(lowered(&clause), "R:0xH000001=1_R:0xH000002=2");
    }

    #[test]
    fn and_inside_a_flag_is_chained() {
        let clause = flag(RequirementType::PauseIf, Clause::and(eq(1, 1), eq(2, 2)));
        assert_eq!(lowered(&clause), "N:0xH000001=1_P:0xH000002=2");
    }

    #[test]
    fn compound_child_is_emitted_first() {
        let clause = repeated(3, Clause::or(eq(1, 1), Clause::and(eq(2, 2), eq(3, 3))));
        assert_eq!(lowered(&clause), "N:0xH000002=2_O:0xH000003=3_0xH000001=1.3.");
    }

    #[test]
    fn never_inside_repeated_becomes_reset_next() {
        let clause = repeated(
            5,
            Clause::and(eq(1, 1), flag(RequirementType::ResetIf, eq(2, 0))),
        );
        assert_eq!(lowered(&clause), "Z:0xH000002=0_0xH000001=1.5.");
    }

    #[test]
    fn unless_inside_repeated_is_unsupported() {
        let clause = repeated(5, Clause::and(eq(1, 1), flag(RequirementType::PauseIf, eq(2, 0))));
        assert!(matches!(
            lower_group(&[clause]),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let clause = flag(RequirementType::ResetIf, flag(RequirementType::PauseIf, eq(1, 1)));
        assert_eq!(
            lower_group(&[clause]),
            Err(CompileError::ConflictingFlags {
                applied: "never()",
                existing: "unless()"
            })
        );
    }

    #[test]
    fn tally_ending_in_plain_item_carries_target() {
        let clause = Clause::Tally {
            count: 4,
            items: vec![repeated(1, eq(1, 1)), eq(2, 2)],
        };
        assert_eq!(lowered(&clause), "C:0xH000001=1.1._0xH000002=2.4.");
    }

    #[test]
    fn tally_ending_in_deduct_gets_false_terminator() {
        let clause = Clause::Tally {
            count: 4,
            items: vec![eq(1, 1), Clause::Deduct(Box::new(eq(2, 2)))],
        };
        assert_eq!(lowered(&clause), "C:0xH000001=1_D:0xH000002=2_0=1.4.");
    }

    #[test]
    fn disable_when_uses_reset_next_and_pause() {
        let clause = Clause::DisableWhen {
            clause: Box::new(repeated(3, eq(1, 1))),
            until: Some(Box::new(eq(2, 2))),
        };
        assert_eq!(lowered(&clause), "Z:0xH000002=2_P:0xH000001=1.3.");
    }

    #[test]
    fn disable_when_keeps_a_tally_chain() {
        let clause = Clause::DisableWhen {
            clause: Box::new(Clause::Tally {
                count: 3,
                items: vec![eq(1, 1), eq(2, 2)],
            }),
            until: Some(Box::new(eq(3, 1))),
        };
        assert_eq!(lowered(&clause), "Z:0xH000003=1_C:0xH000001=1_P:0xH000002=2.3.");
    }

    #[test]
    fn measured_with_condition() {
        let clause = Clause::Measured {
            clause: Box::new(repeated(10, eq(1, 1))),
            when: Some(Box::new(Clause::and(eq(2, 2), eq(3, 3)))),
            percent: true,
        };
        assert_eq!(lowered(&clause), "G:0xH000001=1.10._Q:0xH000002=2_Q:0xH000003=3");
    }

    #[test]
    fn deduct_outside_tally_fails() {
        let clause = Clause::Deduct(Box::new(eq(1, 1)));
        assert!(matches!(
            lower_group(&[clause]),
            Err(CompileError::Unsupported {
                construct: "deduct()",
                ..
            })
        ));
    }
}
