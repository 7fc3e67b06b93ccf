//! Cost estimation from table statistics.

use serde::Serialize;
use tracing::debug;

use crate::model::SemanticModel;
use crate::planner::aliases::FACT_ALIAS;
use crate::sql::{BinaryOperator, Expr, Query, UnaryOperator};

use super::{CostError, CostResult, LimitKind, RoleLimits, Violation};

/// Row count assumed for tables without statistics.
const DEFAULT_ROW_COUNT: u64 = 1_000_000;
/// Row width assumed for tables without statistics.
const DEFAULT_ROW_BYTES: u64 = 100;

const EQUALITY_SELECTIVITY: f64 = 0.1;
const RANGE_SELECTIVITY: f64 = 0.33;
const LIKE_SELECTIVITY: f64 = 0.5;
const DEFAULT_SELECTIVITY: f64 = 0.5;

/// Projected size of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostEstimate {
    /// Fact rows read after predicates on the fact table alone.
    pub scanned_rows: u64,
    /// Bytes read across the fact scan and every joined table.
    pub scan_bytes: u64,
    /// Fact rows surviving every predicate.
    pub filtered_rows: u64,
    pub output_rows: u64,
    pub joins: usize,
}

pub struct CostEstimator<'a> {
    model: &'a SemanticModel,
}

impl<'a> CostEstimator<'a> {
    pub fn new(model: &'a SemanticModel) -> Self {
        Self { model }
    }

    /// Approve `query` under `limits`, or report every exceeded limit.
    pub fn check(&self, query: &Query, limits: &RoleLimits) -> CostResult<CostEstimate> {
        let estimate = self.estimate(query);
        let mut violations = Vec::new();

        if estimate.output_rows > limits.max_output_rows {
            let remediation = if query.row_limit().is_none() {
                "add a limit or group by fewer dimensions"
            } else {
                "group by fewer or coarser dimensions"
            };
            violations.push(Violation {
                limit: LimitKind::MaxOutputRows,
                estimated: estimate.output_rows,
                allowed: limits.max_output_rows,
                remediation: remediation.into(),
            });
        }

        if estimate.scan_bytes > limits.max_scan_bytes {
            let remediation = if has_range_predicate(query) {
                "add a filter or use a pre-aggregated table"
            } else {
                "add a time range"
            };
            violations.push(Violation {
                limit: LimitKind::MaxScanBytes,
                estimated: estimate.scan_bytes,
                allowed: limits.max_scan_bytes,
                remediation: remediation.into(),
            });
        }

        if estimate.joins > limits.max_joins {
            violations.push(Violation {
                limit: LimitKind::MaxJoins,
                estimated: estimate.joins as u64,
                allowed: limits.max_joins as u64,
                remediation: "request dimensions from fewer tables".into(),
            });
        }

        debug!(
            scan_bytes = estimate.scan_bytes,
            output_rows = estimate.output_rows,
            joins = estimate.joins,
            violations = violations.len(),
            "cost checked"
        );

        if violations.is_empty() {
            Ok(estimate)
        } else {
            Err(CostError::QueryTooExpensive { violations })
        }
    }

    pub fn estimate(&self, query: &Query) -> CostEstimate {
        let tables = query.table_aliases();
        let fact_table = tables
            .iter()
            .find(|(alias, _)| alias == FACT_ALIAS)
            .map(|(_, table)| table.as_str())
            .unwrap_or_else(|| self.model.fact_table());

        let (fact_rows, fact_bytes) = self.table_stats(fact_table);

        let mut fact_selectivity = 1.0;
        let mut total_selectivity = 1.0;
        if let Some(predicate) = &query.where_clause {
            for conjunct in predicate.conjuncts() {
                let s = selectivity(conjunct);
                total_selectivity *= s;
                let qualifiers = conjunct.referenced_tables();
                if !qualifiers.is_empty() && qualifiers.iter().all(|q| q == FACT_ALIAS) {
                    fact_selectivity *= s;
                }
            }
        }

        let scanned_rows = scale(fact_rows, fact_selectivity);
        let filtered_rows = scale(fact_rows, total_selectivity);

        let dimension_bytes: u64 = tables
            .iter()
            .filter(|(alias, _)| alias != FACT_ALIAS)
            .map(|(_, table)| {
                let (rows, bytes) = self.table_stats(table);
                rows.saturating_mul(bytes)
            })
            .fold(0u64, u64::saturating_add);
        let scan_bytes = scanned_rows
            .saturating_mul(fact_bytes)
            .saturating_add(dimension_bytes);

        let mut output_rows = self.output_rows(query, &tables, filtered_rows);
        if let Some(limit) = query.row_limit() {
            output_rows = output_rows.min(limit);
        }

        CostEstimate {
            scanned_rows,
            scan_bytes,
            filtered_rows,
            output_rows,
            joins: query.joins.len(),
        }
    }

    fn table_stats(&self, table: &str) -> (u64, u64) {
        match self.model.table(table) {
            Some(info) => (
                info.row_count.unwrap_or(DEFAULT_ROW_COUNT),
                info.avg_row_bytes.unwrap_or(DEFAULT_ROW_BYTES),
            ),
            None => (DEFAULT_ROW_COUNT, DEFAULT_ROW_BYTES),
        }
    }

    fn output_rows(&self, query: &Query, tables: &[(String, String)], filtered_rows: u64) -> u64 {
        let keys: Vec<&Expr> = if !query.group_by.is_empty() {
            query.group_by.iter().collect()
        } else if query.distinct {
            query.select.iter().map(|s| &s.expr).collect()
        } else if query.select.iter().any(|s| is_aggregate(&s.expr)) {
            return 1;
        } else {
            return filtered_rows.max(1);
        };

        let groups = keys
            .iter()
            .map(|key| self.distinct_values(key, tables))
            .fold(1u64, u64::saturating_mul);
        groups.min(filtered_rows).max(1)
    }

    /// Approximate distinct values of a grouping key.
    fn distinct_values(&self, key: &Expr, tables: &[(String, String)]) -> u64 {
        match key {
            Expr::Column {
                table: Some(alias),
                column,
            } => {
                let table = tables
                    .iter()
                    .find(|(a, _)| a == alias)
                    .map(|(_, t)| t.as_str());
                let Some(table) = table else {
                    return DEFAULT_ROW_COUNT;
                };
                self.model
                    .dimension_for_column(table, column)
                    .and_then(|d| d.approx_distinct)
                    .unwrap_or_else(|| self.table_stats(table).0)
            }
            Expr::Case { when_clauses, .. } => when_clauses.len() as u64 + 1,
            Expr::Paren(inner) => self.distinct_values(inner, tables),
            _ => DEFAULT_ROW_COUNT,
        }
    }
}

/// Fraction of rows passing `predicate`, between 0 and 1.
fn selectivity(predicate: &Expr) -> f64 {
    match predicate {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::Eq => EQUALITY_SELECTIVITY,
            BinaryOperator::Ne => 1.0 - EQUALITY_SELECTIVITY,
            BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::Lte | BinaryOperator::Gte => {
                RANGE_SELECTIVITY
            }
            BinaryOperator::Like => LIKE_SELECTIVITY,
            BinaryOperator::And => selectivity(left) * selectivity(right),
            BinaryOperator::Or => {
                let (l, r) = (selectivity(left), selectivity(right));
                l + r - l * r
            }
            _ => DEFAULT_SELECTIVITY,
        },
        Expr::Between { negated, .. } => {
            if *negated {
                1.0 - RANGE_SELECTIVITY
            } else {
                RANGE_SELECTIVITY
            }
        }
        Expr::In {
            values, negated, ..
        } => {
            let s = (values.len() as f64 * EQUALITY_SELECTIVITY).min(1.0);
            if *negated {
                1.0 - s
            } else {
                s
            }
        }
        Expr::IsNull { negated, .. } => {
            if *negated {
                1.0 - EQUALITY_SELECTIVITY
            } else {
                EQUALITY_SELECTIVITY
            }
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => 1.0 - selectivity(expr),
        Expr::Paren(inner) => selectivity(inner),
        _ => DEFAULT_SELECTIVITY,
    }
}

fn is_aggregate(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Function { name, .. }
            if matches!(name.to_uppercase().as_str(), "SUM" | "AVG" | "COUNT" | "MIN" | "MAX")
    )
}

fn has_range_predicate(query: &Query) -> bool {
    let mut found = false;
    if let Some(predicate) = &query.where_clause {
        predicate.walk(&mut |e| {
            if matches!(e, Expr::Between { .. }) {
                found = true;
            }
        });
    }
    found
}

fn scale(rows: u64, fraction: f64) -> u64 {
    ((rows as f64) * fraction).round().max(1.0) as u64
}
