//! Cross-multiplication of OR lists into alt groups.

use cheevo_data::{MAX_EXPANSION_SIZE, RequirementOperator};
use log::debug;

use crate::clause::Clause;
use crate::error::CompileError;

/// Projected alt count at which collapsing into OrNext chains is attempted.
const COLLAPSE_THRESHOLD: usize = 20;

/// Turns `k` OR lists into the Cartesian product of their disjuncts.
///
/// Lists of simple disjuncts may be folded into a single OrNext clause in
/// `core` to keep the product small. Combinations that can never be true are
/// dropped; if none survive a single `always_false()` alt is returned.
pub(super) fn cross_multiply(mut lists: Vec<Vec<Clause>>, core: &mut Vec<Clause>) -> Result<Vec<Vec<Clause>>, CompileError> {
    if lists.is_empty() {
        return Ok(Vec::new());
    }

    let mut projected = product(&lists);
    while projected >= COLLAPSE_THRESHOLD && (lists.len() > 1 || projected > MAX_EXPANSION_SIZE) {
        let Some(index) = collapsible(&lists) else {
            break;
        };
        let list = lists.remove(index);
        debug!(
            "collapsing {} disjuncts into an OrNext chain (projected {projected} alt groups)",
            list.len()
        );
        projected = product(&lists);
        core.push(Clause::Or(list));
    }

    if projected > MAX_EXPANSION_SIZE {
        return Err(CompileError::ExpansionLimit {
            projected,
            limit: MAX_EXPANSION_SIZE,
        });
    }
    debug!("expanding {} OR lists into {projected} alt groups", lists.len());

    let mut alts = Vec::with_capacity(projected);
    let mut odometer = vec![0usize; lists.len()];
    loop {
        let chosen = odometer.iter().zip(&lists).map(|(&i, list)| &list[i]);
        if let Some(combination) = simplify_combination(chosen) {
            alts.push(combination);
        }
        if !advance(&mut odometer, &lists) {
            break;
        }
    }

    if alts.is_empty() {
        alts.push(vec![Clause::AlwaysFalse]);
    }
    Ok(alts)
}

fn product(lists: &[Vec<Clause>]) -> usize {
    lists.iter().fold(1usize, |acc, list| acc.saturating_mul(list.len()))
}

/// Largest list whose every disjunct can live in an OrNext chain.
fn collapsible(lists: &[Vec<Clause>]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, list) in lists.iter().enumerate() {
        if list.len() < 2 || !list.iter().all(Clause::is_simple) {
            continue;
        }
        if best.is_none_or(|b| list.len() > lists[b].len()) {
            best = Some(index);
        }
    }
    best
}

fn advance(odometer: &mut [usize], lists: &[Vec<Clause>]) -> bool {
    for position in (0..odometer.len()).rev() {
        odometer[position] += 1;
        if odometer[position] < lists[position].len() {
            return true;
        }
        odometer[position] = 0;
    }
    false
}

/// ANDs the chosen disjuncts, or returns `None` when they contradict.
fn simplify_combination<'a>(chosen: impl Iterator<Item = &'a Clause>) -> Option<Vec<Clause>> {
    let mut items: Vec<Clause> = Vec::new();
    for clause in chosen {
        let parts = match clause {
            Clause::And(parts) => parts.as_slice(),
            other => std::slice::from_ref(other),
        };
        for part in parts {
            match part {
                Clause::AlwaysTrue => {},
                Clause::AlwaysFalse => return None,
                other if items.contains(other) => {},
                other => {
                    if items.iter().any(|existing| contradicts(existing, other)) {
                        return None;
                    }
                    items.push(other.clone());
                },
            }
        }
    }
    Some(items)
}

/// `x == a && x == b` with `a != b`, or `x == a && x != a`.
fn contradicts(a: &Clause, b: &Clause) -> bool {
    let (
        Clause::Compare {
            op: op_a,
            left: left_a,
            right: right_a,
        },
        Clause::Compare {
            op: op_b,
            left: left_b,
            right: right_b,
        },
    ) = (a, b)
    else {
        return false;
    };
    if left_a != left_b || !matches!(left_a.as_ref(), Clause::Memory(_)) {
        return false;
    }
    match (op_a, op_b, right_a.as_ref(), right_b.as_ref()) {
        (RequirementOperator::Equal, RequirementOperator::Equal, Clause::Constant(x), Clause::Constant(y)) => x != y,
        (RequirementOperator::Equal, RequirementOperator::NotEqual, x, y)
        | (RequirementOperator::NotEqual, RequirementOperator::Equal, x, y) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::MemoryAccessor;
    use cheevo_data::{Field, FieldSize};

    fn eq(address: u32, value: i64) -> Clause {
        Clause::compare(
            RequirementOperator::Equal,
            Clause::Memory(MemoryAccessor::new(Field::memory(FieldSize::Byte, address))),
            Clause::Constant(value),
        )
    }

    fn counted(address: u32) -> Clause {
        Clause::Repeated {
            count: 2,
            clause: Box::new(eq(address, 1)),
        }
    }

    #[test]
    fn two_by_two_yields_four_alts() {
        let mut core = Vec::new();
        let alts = cross_multiply(vec![vec![eq(1, 1), eq(2, 2)], vec![eq(3, 3), eq(4, 4)]], &mut core)
            .expect("expand");
        assert_eq!(
            alts,
            vec![
                vec![eq(1, 1), eq(3, 3)],
                vec![eq(1, 1), eq(4, 4)],
                vec![eq(2, 2), eq(3, 3)],
                vec![eq(2, 2), eq(4, 4)],
            ]
        );
        assert!(core.is_empty());
    }

    #[test]
    fn contradictory_combinations_are_dropped() {
        let mut core = Vec::new();
        let alts = cross_multiply(vec![vec![eq(1, 1), eq(1, 2)], vec![eq(1, 1), eq(1, 2)]], &mut core)
            .expect("expand");
        assert_eq!(alts, vec![vec![eq(1, 1)], vec![eq(1, 2)]]);
    }

    #[test]
    fn large_products_collapse_simple_lists() {
        let lists: Vec<Vec<Clause>> = (0..5).map(|l| (0..7).map(|i| eq(l * 16 + i, 1)).collect()).collect();
        let mut core = Vec::new();
        let alts = cross_multiply(lists, &mut core).expect("expand");
        assert_eq!(alts.len(), 7);
        assert_eq!(core.len(), 4);
        assert!(core.iter().all(|clause| matches!(clause, Clause::Or(items) if items.len() == 7)));
    }

    #[test]
    fn products_over_the_limit_fail() {
        let lists: Vec<Vec<Clause>> = (0..5).map(|l| (0..7).map(|i| counted(l * 16 + i)).collect()).collect();
        let mut core = Vec::new();
        let err = cross_multiply(lists, &mut core).expect_err("limit");
        assert_eq!(
            err,
            CompileError::ExpansionLimit {
                projected: 16_807,
                limit: MAX_EXPANSION_SIZE
            }
        );
    }
}
