//! Metric expression parser that converts the sqlparser AST into our Expr AST.
//!
//! Metric expressions are scalar SQL over qualified columns
//! (`fact_sales.quantity * fact_sales.unit_price`). The aggregation is
//! declared separately, so aggregate calls inside the expression are
//! rejected. Anything outside the supported subset is an error rather than a
//! pass-through, which keeps every emitted fragment structurally typed.

use sqlparser::ast as sql;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::sql::{BinaryOperator, Expr, Literal, UnaryOperator};

/// Errors that can occur while parsing a metric expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("unsupported SQL feature: {0}")]
    Unsupported(String),

    #[error("column '{0}' must be qualified as table.column")]
    UnqualifiedColumn(String),

    #[error("aggregate function {0} is not allowed inside a metric expression")]
    AggregateNotAllowed(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

const AGGREGATES: &[&str] = &["SUM", "AVG", "COUNT", "MIN", "MAX"];

/// Parse a metric expression. `*` alone is accepted for `COUNT(*)` metrics.
pub fn parse_metric_expr(source: &str) -> ParseResult<Expr> {
    if source.trim() == "*" {
        return Ok(Expr::Star { table: None });
    }

    let dialect = GenericDialect {};
    let parsed = Parser::new(&dialect)
        .try_with_sql(source)
        .and_then(|mut p| p.parse_expr())
        .map_err(|e| ParseError::Syntax(e.to_string()))?;

    convert(&parsed)
}

fn convert(expr: &sql::Expr) -> ParseResult<Expr> {
    match expr {
        sql::Expr::Identifier(ident) => Err(ParseError::UnqualifiedColumn(ident.value.clone())),

        sql::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] => Ok(Expr::Column {
                table: Some(table.value.clone()),
                column: column.value.clone(),
            }),
            _ => Err(ParseError::Unsupported(format!(
                "identifier '{}' (expected table.column)",
                expr
            ))),
        },

        sql::Expr::Value(value) => convert_value(value).map(Expr::Literal),

        sql::Expr::Nested(inner) => Ok(Expr::Paren(Box::new(convert(inner)?))),

        sql::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(convert(left)?),
            op: convert_binary_op(op)?,
            right: Box::new(convert(right)?),
        }),

        sql::Expr::UnaryOp { op, expr: inner } => {
            let op = match op {
                sql::UnaryOperator::Not => UnaryOperator::Not,
                sql::UnaryOperator::Minus => UnaryOperator::Minus,
                sql::UnaryOperator::Plus => return convert(inner),
                other => return Err(ParseError::Unsupported(format!("unary operator {}", other))),
            };
            Ok(Expr::UnaryOp {
                op,
                expr: Box::new(convert(inner)?),
            })
        }

        sql::Expr::IsNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert(inner)?),
            negated: false,
        }),

        sql::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert(inner)?),
            negated: true,
        }),

        sql::Expr::Case {
            operand,
            conditions,
            results,
            else_result,
            ..
        } => {
            let when_clauses = conditions
                .iter()
                .zip(results.iter())
                .map(|(w, t)| Ok((convert(w)?, convert(t)?)))
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::Case {
                operand: operand
                    .as_deref()
                    .map(convert)
                    .transpose()?
                    .map(Box::new),
                when_clauses,
                else_clause: else_result
                    .as_deref()
                    .map(convert)
                    .transpose()?
                    .map(Box::new),
            })
        }

        sql::Expr::Function(function) => convert_function(function),

        other => Err(ParseError::Unsupported(other.to_string())),
    }
}

fn convert_value(value: &sql::Value) -> ParseResult<Literal> {
    match value {
        sql::Value::Number(n, _) => n
            .parse::<i64>()
            .map(Literal::Int)
            .or_else(|_| n.parse::<f64>().map(Literal::Float))
            .map_err(|_| ParseError::Syntax(format!("invalid number '{}'", n))),
        sql::Value::SingleQuotedString(s) => Ok(Literal::String(s.clone())),
        sql::Value::Boolean(b) => Ok(Literal::Bool(*b)),
        sql::Value::Null => Ok(Literal::Null),
        other => Err(ParseError::Unsupported(format!("literal {}", other))),
    }
}

fn convert_binary_op(op: &sql::BinaryOperator) -> ParseResult<BinaryOperator> {
    Ok(match op {
        sql::BinaryOperator::Plus => BinaryOperator::Plus,
        sql::BinaryOperator::Minus => BinaryOperator::Minus,
        sql::BinaryOperator::Multiply => BinaryOperator::Mul,
        sql::BinaryOperator::Divide => BinaryOperator::Div,
        sql::BinaryOperator::Modulo => BinaryOperator::Mod,
        sql::BinaryOperator::Eq => BinaryOperator::Eq,
        sql::BinaryOperator::NotEq => BinaryOperator::Ne,
        sql::BinaryOperator::Lt => BinaryOperator::Lt,
        sql::BinaryOperator::Gt => BinaryOperator::Gt,
        sql::BinaryOperator::LtEq => BinaryOperator::Lte,
        sql::BinaryOperator::GtEq => BinaryOperator::Gte,
        sql::BinaryOperator::And => BinaryOperator::And,
        sql::BinaryOperator::Or => BinaryOperator::Or,
        other => return Err(ParseError::Unsupported(format!("operator {}", other))),
    })
}

fn convert_function(function: &sql::Function) -> ParseResult<Expr> {
    let name = function
        .name
        .0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".");

    if AGGREGATES.contains(&name.to_uppercase().as_str()) {
        return Err(ParseError::AggregateNotAllowed(name.to_uppercase()));
    }
    if function.over.is_some() || function.filter.is_some() {
        return Err(ParseError::Unsupported(format!("window or filter on {}", name)));
    }

    let (args, distinct) = match &function.args {
        sql::FunctionArguments::None => (Vec::new(), false),
        sql::FunctionArguments::List(list) => {
            let distinct = matches!(
                list.duplicate_treatment,
                Some(sql::DuplicateTreatment::Distinct)
            );
            let args = list
                .args
                .iter()
                .map(|arg| match arg {
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => convert(e),
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => {
                        Ok(Expr::Star { table: None })
                    }
                    other => Err(ParseError::Unsupported(format!("argument {}", other))),
                })
                .collect::<ParseResult<Vec<_>>>()?;
            (args, distinct)
        }
        sql::FunctionArguments::Subquery(_) => {
            return Err(ParseError::Unsupported(format!("subquery argument to {}", name)))
        }
    };

    Ok(Expr::Function {
        name,
        args,
        distinct,
    })
}
