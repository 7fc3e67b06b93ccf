// src/model/metric.rs
use serde::Serialize;

use crate::model::types::{Aggregation, DataType, DisplayFormat};
use crate::sql::Expr;

/// A named aggregate over fact (or dimension) columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Canonical name, also used as the output alias.
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Expression as written in the model.
    pub expression: String,
    /// Parsed expression; column references are `table.column`.
    #[serde(skip)]
    pub expr: Expr,
    pub aggregation: Aggregation,
    pub data_type: DataType,
    pub synonyms: Vec<String>,
    /// Tables the expression depends on.
    pub tables: Vec<String>,
    pub format: DisplayFormat,
}

impl Metric {
    pub fn matches(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(token))
    }

    /// The aggregated expression, still qualified by physical table names.
    pub fn aggregate_expr(&self) -> Expr {
        self.aggregation.apply(self.expr.clone())
    }
}
