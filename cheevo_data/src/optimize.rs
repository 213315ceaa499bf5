//! Requirement group optimizer.
//!
//! Runs over the raw groups produced by the compiler (`groups[0]` is the core)
//! and removes redundancy while keeping the structural rules every trigger
//! must obey.

use std::fmt;

use crate::requirement::{Requirement, RequirementType};
use crate::requirement_ex::RequirementEx;

/// Reasons a set of groups cannot form a valid trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// A combining requirement with no terminating condition.
    IncompleteClause { group: usize },
    /// A `ResetNextIf` at the end of a group with nothing to reset.
    DanglingResetNextIf { group: usize },
    /// More than one distinct Measured target.
    MultipleMeasuredTargets,
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeError::IncompleteClause { group } => {
                write!(f, "incomplete trigger condition in {}", describe_group(*group))
            },
            OptimizeError::DanglingResetNextIf { group } => {
                write!(f, "reset_next_if has no condition to reset in {}", describe_group(*group))
            },
            OptimizeError::MultipleMeasuredTargets => write!(f, "multiple measured targets"),
        }
    }
}

impl std::error::Error for OptimizeError {}

fn describe_group(group: usize) -> String {
    if group == 0 {
        "core group".to_string()
    } else {
        format!("alt group {group}")
    }
}

/// Simplifies `groups` in place.
///
/// With `for_subclause` set only per-group cleanup runs; the cross-group
/// rewrites assume `groups` is a complete trigger.
///
/// # Errors
/// Returns an [`OptimizeError`] when a group contains an unterminated chain,
/// a trailing `ResetNextIf`, or when groups disagree on the Measured target.
pub fn optimize(groups: &mut Vec<Vec<Requirement>>, for_subclause: bool) -> Result<(), OptimizeError> {
    if groups.is_empty() {
        groups.push(Vec::new());
    }

    let mut clauses = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        let combined = RequirementEx::combine(group);
        validate_group(&combined, index)?;
        clauses.push(simplify_group(combined));
    }

    if !for_subclause {
        remove_false_alts(&mut clauses);
        promote_common_clauses(&mut clauses);
        clear_satisfied_alts(&mut clauses);
        merge_single_alt(&mut clauses);
    }

    validate_measured(&clauses)?;

    *groups = clauses.iter().map(|group| RequirementEx::flatten(group)).collect();
    Ok(())
}

fn validate_group(clauses: &[RequirementEx], index: usize) -> Result<(), OptimizeError> {
    if let Some(last) = clauses.last() {
        if !last.is_complete() {
            let trailing = last.requirements.last().map(|req| req.kind);
            return Err(if trailing == Some(RequirementType::ResetNextIf) {
                OptimizeError::DanglingResetNextIf { group: index }
            } else {
                OptimizeError::IncompleteClause { group: index }
            });
        }
    }
    Ok(())
}

fn is_dedupable(clause: &RequirementEx) -> bool {
    let kind_ok = matches!(
        clause.kind(),
        RequirementType::None
            | RequirementType::ResetIf
            | RequirementType::PauseIf
            | RequirementType::Trigger
            | RequirementType::MeasuredIf
    );
    kind_ok && !clause.has_kind(RequirementType::AddHits) && !clause.has_kind(RequirementType::SubHits)
}

fn simplify_group(clauses: Vec<RequirementEx>) -> Vec<RequirementEx> {
    let mut kept: Vec<RequirementEx> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        if is_dedupable(&clause) && kept.contains(&clause) {
            continue;
        }
        kept.push(clause);
    }
    if kept.len() > 1 {
        kept.retain(|clause| !clause.is_always_true());
    }
    kept
}

fn has_flag(group: &[RequirementEx], kind: RequirementType) -> bool {
    group.iter().any(|clause| clause.has_kind(kind))
}

fn has_measured(group: &[RequirementEx]) -> bool {
    group.iter().any(|clause| clause.kind().is_measured())
}

fn remove_false_alts(groups: &mut Vec<Vec<RequirementEx>>) {
    if groups.len() < 2 {
        return;
    }
    let before = groups.len() - 1;
    let mut index = 1;
    while index < groups.len() {
        let alt = &groups[index];
        let is_false = alt.iter().any(RequirementEx::is_always_false);
        if is_false && !has_flag(alt, RequirementType::ResetIf) && !has_measured(alt) {
            groups.remove(index);
        } else {
            index += 1;
        }
    }
    if before > 0 && groups.len() == 1 {
        groups.push(RequirementEx::combine(&[Requirement::always_false()]));
    }
}

fn promote_common_clauses(groups: &mut [Vec<RequirementEx>]) {
    if groups.len() < 3 || groups.iter().any(|group| has_flag(group, RequirementType::PauseIf)) {
        return;
    }
    let (core, alts) = groups.split_at_mut(1);
    let candidates: Vec<RequirementEx> = alts[0].iter().filter(|clause| is_dedupable(clause)).cloned().collect();
    for candidate in candidates {
        if !alts.iter().all(|alt| alt.contains(&candidate)) {
            continue;
        }
        for alt in alts.iter_mut() {
            if let Some(position) = alt.iter().position(|clause| *clause == candidate) {
                alt.remove(position);
            }
        }
        if !core[0].contains(&candidate) {
            core[0].push(candidate);
        }
    }
    if core[0].len() > 1 {
        core[0].retain(|clause| !clause.is_always_true());
    }
}

fn clear_satisfied_alts(groups: &mut Vec<Vec<RequirementEx>>) {
    if groups.len() < 2 {
        return;
    }
    let satisfied = groups[1..]
        .iter()
        .position(|alt| alt.is_empty() || (alt.len() == 1 && alt[0].is_always_true()));
    let Some(satisfied) = satisfied else {
        return;
    };
    let others_inert = groups[1..].iter().enumerate().all(|(i, alt)| {
        i == satisfied || (!has_flag(alt, RequirementType::ResetIf) && !has_measured(alt))
    });
    if others_inert {
        groups.truncate(1);
    }
}

fn merge_single_alt(groups: &mut Vec<Vec<RequirementEx>>) {
    if groups.len() != 2 {
        return;
    }
    if has_flag(&groups[0], RequirementType::PauseIf) || has_flag(&groups[1], RequirementType::PauseIf) {
        return;
    }
    let alt = groups.pop().unwrap_or_default();
    let mut merged = std::mem::take(&mut groups[0]);
    merged.extend(alt);
    groups[0] = simplify_group(merged);
}

fn validate_measured(groups: &[Vec<RequirementEx>]) -> Result<(), OptimizeError> {
    let mut target: Option<&RequirementEx> = None;
    for clause in groups.iter().flatten() {
        if !clause.kind().is_measured() {
            continue;
        }
        match target {
            None => target = Some(clause),
            Some(existing) if existing == clause => {},
            Some(_) => return Err(OptimizeError::MultipleMeasuredTargets),
        }
    }
    Ok(())
}
