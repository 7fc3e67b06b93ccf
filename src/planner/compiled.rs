//! Output of a successful build.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::sql::{Dialect, Literal, Query};
use crate::validation::{direction_label, ResolvedIntent};

/// What an output column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Dimension,
    Metric,
    /// `current` / `baseline` label of a comparison split.
    Period,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Name of the comparison split column.
pub const PERIOD_COLUMN: &str = "period";

/// Executable SQL plus everything needed to audit it.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    /// SQL with dialect placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<Literal>,
    /// SQL with values inlined. Never executed.
    pub display_sql: String,
    pub dialect: Dialect,
    #[serde(skip)]
    pub query: Query,
    pub columns: Vec<OutputColumn>,
    /// `(table, alias)` pairs, fact table first.
    pub aliases: Vec<(String, String)>,
    pub explanation: String,
}

impl CompiledQuery {
    pub(crate) fn new(
        query: Query,
        dialect: Dialect,
        columns: Vec<OutputColumn>,
        aliases: Vec<(String, String)>,
        explanation: String,
    ) -> Self {
        let (sql, params) = query.to_bound_sql(dialect);
        let display_sql = query.to_sql(dialect);
        Self {
            sql,
            params,
            display_sql,
            dialect,
            query,
            columns,
            aliases,
            explanation,
        }
    }

    /// SHA-256 over the SQL and its typed parameters, hex encoded.
    ///
    /// Equivalent intents compile to the same SQL and parameters and so
    /// share a key.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        for param in &self.params {
            hasher.update([0u8]);
            hasher.update(format!("{:?}", param).as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One-line, human-readable summary of what the query computes.
pub(crate) fn explain(intent: &ResolvedIntent) -> String {
    let mut parts = Vec::new();

    if !intent.metrics.is_empty() {
        parts.push(format!("Calculating: {}", intent.metrics.join(", ")));
    }
    if !intent.dimensions.is_empty() {
        let label = if intent.metrics.is_empty() {
            "Listing"
        } else {
            "Grouped by"
        };
        parts.push(format!("{}: {}", label, intent.dimensions.join(", ")));
    }
    if !intent.filters.is_empty() {
        let filters: Vec<String> = intent
            .filters
            .iter()
            .map(|f| format!("{} {}", f.dimension, f.operator))
            .collect();
        parts.push(format!("Filters: {}", filters.join(", ")));
    }
    if let Some(range) = &intent.time_range {
        parts.push(format!("Time period: {} on {}", range.label(), range.dimension));
    }
    if let Some(baseline) = &intent.comparison {
        parts.push(format!("Compared with: {}", baseline.label()));
    }
    if !intent.sort.is_empty() {
        let sort: Vec<String> = intent
            .sort
            .iter()
            .map(|s| format!("{} {}", s.field, direction_label(s.direction)))
            .collect();
        parts.push(format!("Sorted by: {}", sort.join(", ")));
    }
    if let Some(limit) = intent.limit {
        parts.push(format!("Limit: {}", limit));
    }
    if !intent.security_filters.is_empty() {
        parts.push("Row-level security applied".to_string());
    }

    if parts.is_empty() {
        "Simple query".to_string()
    } else {
        parts.join(" | ")
    }
}
