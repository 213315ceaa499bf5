use crate::requirement::{Requirement, RequirementType};

/// `ResetNextIf` belongs to the clause it resets, so it is grouped forward
/// like the combining kinds.
fn continues_clause(kind: RequirementType) -> bool {
    kind.is_combining() || kind == RequirementType::ResetNextIf
}

/// A terminating requirement together with the chain that feeds it.
///
/// Built on demand from a flat group and thrown away after use.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequirementEx {
    pub requirements: Vec<Requirement>,
}

impl RequirementEx {
    /// Splits a flat group into clauses. A trailing chain with no terminator
    /// becomes an incomplete clause.
    pub fn combine(group: &[Requirement]) -> Vec<RequirementEx> {
        let mut clauses = Vec::new();
        let mut current = RequirementEx::default();
        for requirement in group {
            current.requirements.push(*requirement);
            if !continues_clause(requirement.kind) {
                clauses.push(std::mem::take(&mut current));
            }
        }
        if !current.requirements.is_empty() {
            clauses.push(current);
        }
        clauses
    }

    /// Concatenates clauses back into a flat group.
    pub fn flatten(clauses: &[RequirementEx]) -> Vec<Requirement> {
        clauses.iter().flat_map(|clause| clause.requirements.iter().copied()).collect()
    }

    pub fn terminator(&self) -> Option<&Requirement> {
        self.requirements.last().filter(|req| !continues_clause(req.kind))
    }

    pub fn is_complete(&self) -> bool {
        self.terminator().is_some()
    }

    /// Flag of the terminating requirement.
    pub fn kind(&self) -> RequirementType {
        self.terminator().map_or(RequirementType::None, |req| req.kind)
    }

    pub fn hit_count(&self) -> u32 {
        self.terminator().map_or(0, |req| req.hit_count)
    }

    pub fn has_kind(&self, kind: RequirementType) -> bool {
        self.requirements.iter().any(|req| req.kind == kind)
    }

    /// A lone `1=1` with no flag, chain or hit target.
    pub fn is_always_true(&self) -> bool {
        matches!(self.requirements.as_slice(),
            [req] if req.kind == RequirementType::None && req.hit_count == 0 && req.constant_result() == Some(true))
    }

    /// A lone unflagged comparison that can never be true.
    pub fn is_always_false(&self) -> bool {
        matches!(self.requirements.as_slice(),
            [req] if req.kind == RequirementType::None && req.constant_result() == Some(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, FieldSize, RequirementOperator};

    fn byte(address: u32) -> Field {
        Field::memory(FieldSize::Byte, address)
    }

    #[test]
    fn combine_groups_chains_with_their_terminator() {
        let group = vec![
            Requirement::operand(RequirementType::AddAddress, Field::memory(FieldSize::Word, 0x10)),
            Requirement::compare(byte(4), RequirementOperator::Equal, Field::value(1)),
            Requirement::compare(byte(5), RequirementOperator::Equal, Field::value(2)),
            Requirement::operand(RequirementType::AddSource, byte(6)),
        ];
        let clauses = RequirementEx::combine(&group);
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0].requirements.len(), 2);
        assert!(clauses[1].is_complete());
        assert!(!clauses[2].is_complete());
        assert_eq!(RequirementEx::flatten(&clauses), group);
    }

    #[test]
    fn constant_clauses_are_recognised() {
        let clauses = RequirementEx::combine(&[Requirement::always_true(), Requirement::always_false()]);
        assert!(clauses[0].is_always_true());
        assert!(clauses[1].is_always_false());
        assert!(!clauses[0].is_always_false());
    }
}
