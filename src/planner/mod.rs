//! Query builder: resolved intent to a typed [`Query`] and its SQL.
//!
//! The build is a straight pipeline with no search:
//! 1. Join planning: required tables expanded along their unique paths
//! 2. Alias assignment: `f` for the fact table, then `a`, `b`, …
//! 3. SELECT / WHERE / GROUP BY / ORDER BY / LIMIT from the intent
//!
//! Identical input always yields byte-identical SQL.

pub mod aliases;
pub mod compiled;
pub mod cost;
pub mod filters;
pub mod joins;

pub use aliases::{AliasMap, FACT_ALIAS};
pub use compiled::{ColumnKind, CompiledQuery, OutputColumn, PERIOD_COLUMN};
pub use cost::{CostError, CostEstimate, CostEstimator, RoleLimits, Violation};
pub use joins::JoinPlan;

use thiserror::Error;
use tracing::debug;

use crate::intent::{FilterOperator, SortDirection};
use crate::model::{Dimension, SemanticModel};
use crate::sql::{
    col, table_col, Dialect, Expr, ExprExt, OrderByExpr, Query, SelectExpr, SortDir, SqlDialect,
    TableRef,
};
use crate::validation::{RequiredTables, ResolvedIntent};

/// Errors that can occur during planning.
///
/// These are model configuration defects or malformed resolved intents,
/// never caller mistakes the validator would have caught.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("no join path from '{fact_table}' to '{table}'")]
    NoJoinPath { table: String, fact_table: String },

    #[error("{operator} on '{dimension}' takes {expected} value(s), got {found}")]
    InvalidFilterArity {
        dimension: String,
        operator: FilterOperator,
        expected: &'static str,
        found: usize,
    },

    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("{context} references table '{table}' which is not part of the query")]
    MissingTable { context: String, table: String },
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Builds SQL for resolved intents against one model.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    model: &'a SemanticModel,
    dialect: Dialect,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(model: &'a SemanticModel) -> Self {
        Self {
            model,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn build(
        &self,
        intent: &ResolvedIntent,
        required: &RequiredTables,
    ) -> PlanResult<CompiledQuery> {
        let model = self.model;
        let plan = JoinPlan::resolve(model, required)?;
        let aliases = AliasMap::assign(
            model.fact_table(),
            plan.tables.iter().map(String::as_str),
        );

        let column_of = |dim: &Dimension| -> PlanResult<Expr> {
            let alias = aliases.get(&dim.table).ok_or_else(|| PlanError::MissingTable {
                context: format!("dimension '{}'", dim.name),
                table: dim.table.clone(),
            })?;
            Ok(table_col(alias, &dim.column))
        };

        let mut select: Vec<SelectExpr> = Vec::new();
        let mut group_by: Vec<Expr> = Vec::new();
        let mut columns: Vec<OutputColumn> = Vec::new();

        // Dimensions
        for name in &intent.dimensions {
            let dim = self.dimension(name)?;
            let expr = column_of(dim)?;
            select.push(expr.clone().alias(&dim.name));
            group_by.push(expr);
            columns.push(OutputColumn {
                name: dim.name.clone(),
                kind: ColumnKind::Dimension,
            });
        }

        // Comparison split
        let window = match &intent.time_range {
            Some(range) => {
                let dim = self.dimension(&range.dimension)?;
                Some((dim, column_of(dim)?, range))
            }
            None => None,
        };
        if let (Some((dim, column, current)), Some(_)) = (&window, &intent.comparison) {
            let case = filters::period_case(column.clone(), dim, current);
            select.push(case.clone().alias(PERIOD_COLUMN));
            group_by.push(case);
            columns.push(OutputColumn {
                name: PERIOD_COLUMN.to_string(),
                kind: ColumnKind::Period,
            });
        }

        // Metrics
        for name in &intent.metrics {
            let metric = self
                .model
                .resolve_metric(name)
                .filter(|m| &m.name == name)
                .ok_or_else(|| PlanError::UnknownName {
                    kind: "metric",
                    name: name.clone(),
                })?;
            let expr = metric
                .aggregate_expr()
                .try_rewrite_tables(&|t| aliases.get(t).map(String::from))
                .map_err(|table| PlanError::MissingTable {
                    context: format!("metric '{}'", metric.name),
                    table,
                })?;
            select.push(expr.alias(&metric.name));
            columns.push(OutputColumn {
                name: metric.name.clone(),
                kind: ColumnKind::Metric,
            });
        }

        let fact = model.fact_table();
        let mut query = Query::new()
            .select(select)
            .from(
                TableRef::new(fact)
                    .with_schema(model.table(fact).and_then(|t| t.schema.as_deref()))
                    .with_alias(FACT_ALIAS),
            );
        query.joins = plan.to_joins(model, &aliases)?;

        // WHERE: filters, time window, then security
        for filter in &intent.filters {
            let dim = self.dimension(&filter.dimension)?;
            query = query.filter(filters::filter_predicate(column_of(dim)?, filter)?);
        }
        if let Some((dim, column, current)) = &window {
            let predicate = match &intent.comparison {
                Some(baseline) => {
                    filters::split_window_predicate(column.clone(), dim, current, baseline)
                }
                None => filters::window_predicate(column.clone(), dim, current),
            };
            query = query.filter(predicate);
        }
        for filter in &intent.security_filters {
            let dim = self.dimension(&filter.dimension)?;
            query = query.filter(filters::filter_predicate(column_of(dim)?, filter)?);
        }

        if intent.metrics.is_empty() {
            query = query.distinct();
        } else if !group_by.is_empty() {
            query = query.group_by(group_by);
        }

        if !intent.sort.is_empty() {
            let order = intent
                .sort
                .iter()
                .map(|s| {
                    let dir = match s.direction {
                        SortDirection::Asc => SortDir::Asc,
                        SortDirection::Desc => SortDir::Desc,
                    };
                    OrderByExpr::new(col(&s.field), dir)
                })
                .collect();
            query = query.order_by(order);
        }
        if let Some(limit) = intent.limit {
            query = query.limit(limit);
        }

        let compiled = CompiledQuery::new(
            query,
            self.dialect,
            columns,
            aliases.entries().to_vec(),
            compiled::explain(intent),
        );

        debug!(
            dialect = self.dialect.name(),
            tables = ?plan.tables,
            params = compiled.params.len(),
            sql = %compiled.display_sql,
            "query built"
        );
        Ok(compiled)
    }

    fn dimension(&self, name: &str) -> PlanResult<&'a Dimension> {
        self.model
            .resolve_dimension(name)
            .filter(|d| d.name == name)
            .ok_or_else(|| PlanError::UnknownName {
                kind: "dimension",
                name: name.to_string(),
            })
    }
}
