//! WHERE predicates for filters and time windows.
//!
//! Every caller-supplied value becomes an [`Expr::Param`], so it reaches
//! the executable SQL only as a placeholder.

use crate::intent::FilterOperator;
use crate::model::{DataType, Dimension};
use crate::sql::{lit_str, BinaryOperator, Expr, ExprExt, Literal};
use crate::validation::{ResolvedFilter, ResolvedTimeRange};

use super::{PlanError, PlanResult};

/// Predicate for one filter on `column`.
pub fn filter_predicate(column: Expr, filter: &ResolvedFilter) -> PlanResult<Expr> {
    let params: Vec<Expr> = filter.values.iter().cloned().map(Expr::Param).collect();
    let single = || {
        params
            .first()
            .cloned()
            .filter(|_| params.len() == 1)
            .ok_or_else(|| arity(filter, "exactly 1"))
    };

    let cmp = |op: BinaryOperator| -> PlanResult<Expr> { Ok(column.clone().binary(op, single()?)) };

    match filter.operator {
        FilterOperator::Eq => cmp(BinaryOperator::Eq),
        FilterOperator::Ne => cmp(BinaryOperator::Ne),
        FilterOperator::Gt => cmp(BinaryOperator::Gt),
        FilterOperator::Lt => cmp(BinaryOperator::Lt),
        FilterOperator::Gte => cmp(BinaryOperator::Gte),
        FilterOperator::Lte => cmp(BinaryOperator::Lte),
        FilterOperator::Like => cmp(BinaryOperator::Like),
        FilterOperator::In | FilterOperator::NotIn if params.is_empty() => {
            Err(arity(filter, "at least 1"))
        }
        FilterOperator::In => Ok(column.in_list(params)),
        FilterOperator::NotIn => Ok(column.not_in_list(params)),
        FilterOperator::Between => match params.as_slice() {
            [low, high] => Ok(column.between(low.clone(), high.clone())),
            _ => Err(arity(filter, "exactly 2")),
        },
        FilterOperator::IsNull => Ok(column.is_null()),
        FilterOperator::IsNotNull => Ok(column.is_not_null()),
    }
}

fn arity(filter: &ResolvedFilter, expected: &'static str) -> PlanError {
    PlanError::InvalidFilterArity {
        dimension: filter.dimension.clone(),
        operator: filter.operator,
        expected,
        found: filter.values.len(),
    }
}

/// Bounds of a window typed for the dimension's column: dates for date
/// columns, timestamps otherwise.
fn window_params(dim: &Dimension, range: &ResolvedTimeRange) -> (Expr, Expr) {
    match dim.data_type {
        DataType::Date => (
            Expr::Param(Literal::Date(range.start.date())),
            Expr::Param(Literal::Date(range.end.date())),
        ),
        _ => (
            Expr::Param(Literal::Timestamp(range.start)),
            Expr::Param(Literal::Timestamp(range.end)),
        ),
    }
}

/// Inclusive BETWEEN over the resolved window.
pub fn window_predicate(column: Expr, dim: &Dimension, range: &ResolvedTimeRange) -> Expr {
    let (start, end) = window_params(dim, range);
    column.between(start, end)
}

/// `(col BETWEEN current) OR (col BETWEEN baseline)`.
pub fn split_window_predicate(
    column: Expr,
    dim: &Dimension,
    current: &ResolvedTimeRange,
    baseline: &ResolvedTimeRange,
) -> Expr {
    window_predicate(column.clone(), dim, current)
        .paren()
        .or(window_predicate(column, dim, baseline).paren())
        .paren()
}

/// `CASE WHEN col BETWEEN current THEN 'current' ELSE 'baseline' END`.
pub fn period_case(column: Expr, dim: &Dimension, current: &ResolvedTimeRange) -> Expr {
    Expr::Case {
        operand: None,
        when_clauses: vec![(window_predicate(column, dim, current), lit_str("current"))],
        else_clause: Some(Box::new(lit_str("baseline"))),
    }
}
