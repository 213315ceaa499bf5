use std::rc::Rc;

use pest::iterators::Pair;

use super::helpers::{location, parse_string};
use super::statements::build_block;
use super::{AstError, Rule};
use crate::ast::{Argument, BinaryOp, Expression, ExpressionKind, FunctionDefinition, Parameter, UnaryOp};

pub(super) fn build_expr(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    match pair.as_rule() {
        Rule::expr => {
            let inner = pair.into_inner().next().ok_or(AstError::Shape("empty expression"))?;
            build_expr(inner)
        },
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => build_binary(pair),
        Rule::unary => build_unary(pair),
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let primary = inner.next().ok_or(AstError::Shape("postfix without operand"))?;
            let mut expr = build_expr(primary)?;
            for index in inner {
                let index_loc = location(&index);
                let value = index.into_inner().next().ok_or(AstError::Shape("empty index"))?;
                expr = Expression::new(
                    ExpressionKind::Index {
                        target: Box::new(expr),
                        index: Box::new(build_expr(value)?),
                    },
                    index_loc,
                );
            }
            Ok(expr)
        },
        Rule::integer => {
            let text = pair.as_str();
            let value = text.parse::<i64>().map_err(|_| AstError::Literal {
                text: text.to_string(),
                location: loc,
            })?;
            Ok(Expression::new(ExpressionKind::Integer(value), loc))
        },
        Rule::hex => {
            let text = pair.as_str();
            let value = i64::from_str_radix(&text[2..], 16).map_err(|_| AstError::Literal {
                text: text.to_string(),
                location: loc,
            })?;
            Ok(Expression::new(ExpressionKind::Integer(value), loc))
        },
        Rule::float => {
            let text = pair.as_str();
            let value = text.parse::<f64>().map_err(|_| AstError::Literal {
                text: text.to_string(),
                location: loc,
            })?;
            Ok(Expression::new(ExpressionKind::Float(value), loc))
        },
        Rule::string => Ok(Expression::new(
            ExpressionKind::String(parse_string(pair.as_str())?),
            loc,
        )),
        Rule::boolean => Ok(Expression::new(ExpressionKind::Bool(pair.as_str() == "true"), loc)),
        Rule::ident => Ok(Expression::new(ExpressionKind::Variable(pair.as_str().to_string()), loc)),
        Rule::call => build_call(pair),
        Rule::lambda => build_lambda(pair),
        Rule::array => {
            let items = pair.into_inner().map(build_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::new(ExpressionKind::Array(items), loc))
        },
        Rule::dictionary => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                let mut kv = entry.into_inner();
                let key = kv.next().ok_or(AstError::Shape("dictionary key"))?;
                let value = kv.next().ok_or(AstError::Shape("dictionary value"))?;
                entries.push((build_expr(key)?, build_expr(value)?));
            }
            Ok(Expression::new(ExpressionKind::Dictionary(entries), loc))
        },
        _ => Err(AstError::Shape("unexpected expression rule")),
    }
}

/// Left-folds `operand (op operand)*` into nested binary nodes.
fn build_binary(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or(AstError::Shape("binary operand"))?;
    let mut left = build_expr(first)?;
    while let Some(op_pair) = inner.next() {
        let op_loc = location(&op_pair);
        let op = BinaryOp::from_symbol(op_pair.as_str().trim()).ok_or(AstError::Shape("unknown operator"))?;
        let right = inner.next().ok_or(AstError::Shape("binary operand after operator"))?;
        left = Expression::new(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(build_expr(right)?),
            },
            op_loc,
        );
    }
    Ok(left)
}

fn build_unary(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let mut ops = Vec::new();
    let mut operand = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::unary_op => {
                let op = match p.as_str() {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Negate,
                    _ => UnaryOp::Invert,
                };
                ops.push((op, location(&p)));
            },
            _ => operand = Some(build_expr(p)?),
        }
    }
    let mut expr = operand.ok_or(AstError::Shape("unary without operand"))?;
    for (op, loc) in ops.into_iter().rev() {
        expr = match (op, expr.kind) {
            (UnaryOp::Negate, ExpressionKind::Integer(n)) => Expression::new(ExpressionKind::Integer(-n), loc),
            (UnaryOp::Negate, ExpressionKind::Float(n)) => Expression::new(ExpressionKind::Float(-n), loc),
            (op, kind) => Expression::new(
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(Expression::new(kind, expr.location)),
                },
                loc,
            ),
        };
    }
    Ok(expr)
}

fn build_call(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().ok_or(AstError::Shape("call name"))?.as_str().to_string();
    let mut args = Vec::new();
    for arg in inner {
        let value = arg.into_inner().next().ok_or(AstError::Shape("empty argument"))?;
        if value.as_rule() == Rule::named_arg {
            let mut named = value.into_inner();
            let arg_name = named.next().ok_or(AstError::Shape("argument name"))?.as_str().to_string();
            let arg_value = named.next().ok_or(AstError::Shape("argument value"))?;
            args.push(Argument {
                name: Some(arg_name),
                value: build_expr(arg_value)?,
            });
        } else {
            args.push(Argument {
                name: None,
                value: build_expr(value)?,
            });
        }
    }
    Ok(Expression::new(ExpressionKind::Call { name, args }, loc))
}

fn build_lambda(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner();
    let params = inner
        .next()
        .ok_or(AstError::Shape("lambda parameters"))?
        .into_inner()
        .map(|p| Parameter {
            name: p.as_str().to_string(),
            default: None,
        })
        .collect();
    let body_pair = inner.next().ok_or(AstError::Shape("lambda body"))?;
    let body = function_body(body_pair)?;
    let definition = FunctionDefinition {
        name: None,
        params,
        body,
        location: loc,
    };
    Ok(Expression::new(ExpressionKind::Lambda(Rc::new(definition)), loc))
}

/// A `{ ... }` body, or `=> expr` which returns the expression.
pub(super) fn function_body(pair: Pair<'_, Rule>) -> Result<Vec<Expression>, AstError> {
    if pair.as_rule() == Rule::block {
        return build_block(pair);
    }
    let expr = build_expr(pair)?;
    let loc = expr.location;
    Ok(vec![Expression::new(ExpressionKind::Return(Some(Box::new(expr))), loc)])
}
