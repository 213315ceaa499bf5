//! Parser and AST builders for achievement scripts.
//!
//! Wraps the Pest-generated grammar with helpers that turn parse pairs into
//! the interpreter's [`Expression`] tree.

use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::ast::{Expression, Location};

mod expr;
mod helpers;
mod statements;

use statements::build_statement;

#[derive(PestParser)]
#[grammar = "src/grammar.pest"]
struct ScriptParser;

/// Errors that can happen when parsing script source.
#[derive(Debug, thiserror::Error)]
pub enum AstError {
    #[error("parse error: {0}")]
    Pest(String),
    #[error("unexpected grammar shape: {0}")]
    Shape(&'static str),
    #[error("invalid literal '{text}' at {location}")]
    Literal { text: String, location: Location },
}

/// Parse a full script into its top-level statements.
///
/// # Errors
/// Returns an error when the source does not match the grammar or a literal
/// is out of range.
pub fn parse_program(source: &str) -> Result<Vec<Expression>, AstError> {
    let mut pairs = ScriptParser::parse(Rule::program, source).map_err(|e| AstError::Pest(e.to_string()))?;
    let program = pairs.next().ok_or(AstError::Shape("expected program"))?;
    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_statement)
        .collect()
}

/// Parse source that must hold exactly one expression.
///
/// # Errors
/// Returns an error if parsing fails or the source holds anything other than
/// a single statement.
pub fn parse_expression(source: &str) -> Result<Expression, AstError> {
    let mut statements = parse_program(source)?;
    if statements.len() != 1 {
        return Err(AstError::Shape("expected a single expression"));
    }
    Ok(statements.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ExpressionKind, UnaryOp};

    #[test]
    fn comparison_binds_looser_than_arithmetic() {
        let expr = parse_expression("byte(0x10) + 2 * 3 == 7").expect("parse");
        let ExpressionKind::Binary { op, left, .. } = expr.kind else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Equal);
        let ExpressionKind::Binary { op, right, .. } = left.kind else {
            panic!("expected sum");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.kind, ExpressionKind::Binary { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn bitwise_and_is_not_logical_and() {
        let expr = parse_expression("a & 0x0F && b").expect("parse");
        let ExpressionKind::Binary { op, left, .. } = expr.kind else {
            panic!("expected logical and");
        };
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(left.kind, ExpressionKind::Binary { op: BinaryOp::BitwiseAnd, .. }));
    }

    #[test]
    fn statements_and_named_arguments() {
        let program = parse_program(
            r#"
            // leading comment
            function check(addr, value = 1) => byte(addr) == value
            total = 0
            for i in range(1, 3) {
                if i == 2 { total = total + i } else { total[0] = -1 }
            }
            achievement("title", "desc", 5, measured(check(0x10), format="percent"))
            "#,
        )
        .expect("parse");
        assert_eq!(program.len(), 4);
        assert!(matches!(program[0].kind, ExpressionKind::FunctionDefinition(_)));
        assert!(matches!(program[1].kind, ExpressionKind::Assignment { .. }));
        assert!(matches!(program[2].kind, ExpressionKind::For { .. }));
        let ExpressionKind::Call { name, args } = &program[3].kind else {
            panic!("expected call");
        };
        assert_eq!(name, "achievement");
        let ExpressionKind::Call { args: inner, .. } = &args[3].value.kind else {
            panic!("expected measured call");
        };
        assert_eq!(inner[1].name.as_deref(), Some("format"));
        assert_eq!(program[3].location.line, 8);
    }

    #[test]
    fn lambdas_and_unary_operators() {
        let expr = parse_expression("array_map(items, (a) => !a)").expect("parse");
        let ExpressionKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        let ExpressionKind::Lambda(def) = &args[1].value.kind else {
            panic!("expected lambda");
        };
        assert_eq!(def.params.len(), 1);
        let ExpressionKind::Return(Some(body)) = &def.body[0].kind else {
            panic!("expected implicit return");
        };
        assert!(matches!(body.kind, ExpressionKind::Unary { op: UnaryOp::Not, .. }));

        let negative = parse_expression("-5").expect("parse");
        assert_eq!(negative.kind, ExpressionKind::Integer(-5));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert!(parse_program("if = 3").is_err());
        let program = parse_program("index = 3\nformat_name = \"x\"").expect("parse");
        assert_eq!(program.len(), 2);
    }
}
