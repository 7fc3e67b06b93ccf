// src/model/dimension.rs
use serde::Serialize;

use crate::model::types::DataType;

/// A groupable, filterable attribute bound to one physical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    /// Canonical name, also used as the output alias.
    pub name: String,
    pub display_name: String,
    /// Physical table
    pub table: String,
    /// Physical column
    pub column: String,
    pub data_type: DataType,
    pub description: String,
    pub synonyms: Vec<String>,
    /// Optional hierarchy tag (e.g. `geography`, `calendar`).
    pub hierarchy: Option<String>,
    pub is_temporal: bool,
    /// Approximate number of distinct values, used for cost estimates.
    pub approx_distinct: Option<u64>,
}

impl Dimension {
    /// Case-insensitive match against the canonical name or any synonym.
    pub fn matches(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(token))
    }
}
