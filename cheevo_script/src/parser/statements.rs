use std::rc::Rc;

use pest::iterators::Pair;

use super::expr::{build_expr, function_body};
use super::helpers::{is_keyword, location};
use super::{AstError, Rule};
use crate::ast::{Expression, ExpressionKind, FunctionDefinition, Parameter};

pub(super) fn build_statement(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    match pair.as_rule() {
        Rule::function_def => build_function(pair),
        Rule::if_stmt => build_if(pair),
        Rule::for_stmt => build_for(pair),
        Rule::return_stmt => {
            let loc = location(&pair);
            let value = pair
                .into_inner()
                .find(|p| !is_keyword(p.as_rule()))
                .map(build_expr)
                .transpose()?;
            Ok(Expression::new(ExpressionKind::Return(value.map(Box::new)), loc))
        },
        Rule::assignment => build_assignment(pair),
        _ => build_expr(pair),
    }
}

pub(super) fn build_block(pair: Pair<'_, Rule>) -> Result<Vec<Expression>, AstError> {
    pair.into_inner().map(build_statement).collect()
}

fn build_function(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
    let name = inner.next().ok_or(AstError::Shape("function name"))?.as_str().to_string();
    let mut params = Vec::new();
    let mut body = None;
    for p in inner {
        match p.as_rule() {
            Rule::params => {
                for param in p.into_inner() {
                    let mut parts = param.into_inner();
                    let param_name = parts.next().ok_or(AstError::Shape("parameter name"))?.as_str().to_string();
                    let default = parts.next().map(build_expr).transpose()?;
                    params.push(Parameter {
                        name: param_name,
                        default,
                    });
                }
            },
            _ => body = Some(function_body(p)?),
        }
    }
    let definition = FunctionDefinition {
        name: Some(name),
        params,
        body: body.ok_or(AstError::Shape("function body"))?,
        location: loc,
    };
    Ok(Expression::new(ExpressionKind::FunctionDefinition(Rc::new(definition)), loc))
}

fn build_if(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
    let condition = build_expr(inner.next().ok_or(AstError::Shape("if condition"))?)?;
    let then_branch = build_block(inner.next().ok_or(AstError::Shape("if body"))?)?;
    let else_branch = match inner.next() {
        Some(p) if p.as_rule() == Rule::if_stmt => Some(vec![build_if(p)?]),
        Some(p) => Some(build_block(p)?),
        None => None,
    };
    Ok(Expression::new(
        ExpressionKind::If {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        },
        loc,
    ))
}

fn build_for(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
    let variable = inner.next().ok_or(AstError::Shape("loop variable"))?.as_str().to_string();
    let iterable = build_expr(inner.next().ok_or(AstError::Shape("loop source"))?)?;
    let body = build_block(inner.next().ok_or(AstError::Shape("loop body"))?)?;
    Ok(Expression::new(
        ExpressionKind::For {
            variable,
            iterable: Box::new(iterable),
            body,
        },
        loc,
    ))
}

fn build_assignment(pair: Pair<'_, Rule>) -> Result<Expression, AstError> {
    let loc = location(&pair);
    let mut inner = pair.into_inner();
    let target_pair = inner.next().ok_or(AstError::Shape("assignment target"))?;
    let value = build_expr(inner.next().ok_or(AstError::Shape("assignment value"))?)?;

    let mut parts = target_pair.into_inner();
    let name = parts.next().ok_or(AstError::Shape("assignment name"))?;
    let mut target = Expression::new(ExpressionKind::Variable(name.as_str().to_string()), location(&name));
    for index in parts {
        let index_loc = location(&index);
        let index_expr = index.into_inner().next().ok_or(AstError::Shape("empty index"))?;
        target = Expression::new(
            ExpressionKind::Index {
                target: Box::new(target),
                index: Box::new(build_expr(index_expr)?),
            },
            index_loc,
        );
    }
    Ok(Expression::new(
        ExpressionKind::Assignment {
            target: Box::new(target),
            value: Box::new(value),
        },
        loc,
    ))
}
