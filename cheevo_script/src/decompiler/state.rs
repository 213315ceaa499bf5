//! Pending text threaded through the printing of one requirement group.

use cheevo_data::RequirementType;

use super::has_top_level;

/// Text produced by combining instructions and waiting for the condition
/// that closes them. Every field except `remember` is consumed by exactly
/// one later instruction.
#[derive(Debug, Default)]
pub(super) struct PrinterState {
    /// Pointer expression from AddAddress, applied to the next read.
    pub address: Option<String>,
    /// AddSource/SubSource terms; `true` marks a subtracted term.
    pub source: Vec<(bool, String)>,
    /// Expression captured by the last Remember. Stays until replaced.
    pub remember: Option<String>,
    /// AndNext/OrNext prefix and the operator joining it.
    pub logical: Option<(RequirementType, String)>,
    pub reset_next: Option<String>,
    /// Tally items, already wrapped in `deduct()` when subtracted.
    pub hits: Vec<String>,
    /// MeasuredIf conditions for the group's measured clause.
    pub measured_if: Vec<String>,
}

impl PrinterState {
    /// Joins the pending source terms with `last`. A constant zero `last`
    /// is dropped when other terms exist.
    pub fn take_sum(&mut self, last: String, last_is_zero: bool) -> String {
        let mut terms = std::mem::take(&mut self.source);
        if !(last_is_zero && !terms.is_empty()) {
            terms.push((false, last));
        }
        let mut out = terms
            .iter()
            .filter(|(negative, _)| !negative)
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" + ");
        if out.is_empty() {
            out.push('0');
        }
        for (_, text) in terms.iter().filter(|(negative, _)| *negative) {
            out.push_str(" - ");
            out.push_str(text);
        }
        out
    }

    /// Joins `condition` onto the pending AndNext/OrNext prefix.
    pub fn take_chain(&mut self, condition: String) -> String {
        match self.logical.take() {
            None => condition,
            Some((RequirementType::OrNext, prefix)) => {
                let prefix = if has_top_level(&prefix, "&&") {
                    format!("({prefix})")
                } else {
                    prefix
                };
                format!("{prefix} || {condition}")
            },
            Some((_, prefix)) => {
                let prefix = if has_top_level(&prefix, "||") {
                    format!("({prefix})")
                } else {
                    prefix
                };
                format!("{prefix} && {condition}")
            },
        }
    }

    /// True when nothing waits for a closing condition.
    pub fn is_idle(&self) -> bool {
        self.address.is_none()
            && self.source.is_empty()
            && self.logical.is_none()
            && self.reset_next.is_none()
            && self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracted_terms_follow_added_ones() {
        let mut state = PrinterState::default();
        state.source.push((true, "b".into()));
        state.source.push((false, "255".into()));
        assert_eq!(state.take_sum("a".into(), false), "255 + a - b");
        assert!(state.source.is_empty());
    }

    #[test]
    fn zero_terminator_is_dropped_after_terms() {
        let mut state = PrinterState::default();
        assert_eq!(state.take_sum("0".into(), true), "0");
        state.source.push((true, "b".into()));
        assert_eq!(state.take_sum("0".into(), true), "0 - b");
    }

    #[test]
    fn mixed_chains_are_parenthesized() {
        let mut state = PrinterState::default();
        state.logical = Some((RequirementType::OrNext, "a && b".into()));
        assert_eq!(state.take_chain("c".into()), "(a && b) || c");
        assert!(state.logical.is_none());
    }
}
