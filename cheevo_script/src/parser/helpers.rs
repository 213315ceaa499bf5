use pest::iterators::Pair;

use super::{AstError, Rule};
use crate::ast::Location;

pub(super) fn location(pair: &Pair<'_, Rule>) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    Location::new(line, column)
}

/// Keyword tokens carry no information once the rule matched.
pub(super) fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if | Rule::kw_else | Rule::kw_for | Rule::kw_in | Rule::kw_return | Rule::kw_function
    )
}

/// Decode a double-quoted string literal, including its escapes.
pub(super) fn parse_string(s: &str) -> Result<String, AstError> {
    let inner = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(AstError::Shape("missing string quotes"))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => return Err(AstError::Shape("dangling escape in string")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(parse_string(r#""say \"hi\"\n\\done""#).expect("decode"), "say \"hi\"\n\\done");
    }

    #[test]
    fn unknown_escapes_are_kept() {
        assert_eq!(parse_string(r#""a\qb""#).expect("decode"), "a\\qb");
    }
}
