//! Semantic model registry.
//!
//! The registry is the static catalog every other component reads from:
//! tables with their statistics, dimensions, metrics, relationships and the
//! row-level security rules. It is validated once when loaded and never
//! mutated afterwards, so it is shared as `Arc<SemanticModel>`.

pub mod calendar;
pub mod catalog;
pub mod dimension;
pub mod error;
pub mod expr_parser;
pub mod loader;
pub mod metric;
pub mod relationship;
pub mod types;

pub use calendar::{CalendarConfig, WeekStart};
pub use catalog::{Catalog, CatalogEntry, SearchResults};
pub use dimension::Dimension;
pub use error::{ModelError, ModelResult};
pub use loader::ModelDocument;
pub use metric::Metric;
pub use relationship::{ColumnRef, JoinGraph, JoinStep, Relationship};
pub use types::{Aggregation, Cardinality, DataType, DisplayFormat, JoinKind, TableInfo};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Caller scope required to see a dimension's rows.
///
/// A request must carry a non-empty `scope` entry; its values restrict
/// `dimension` with an IN filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSecurityRule {
    pub dimension: String,
    pub scope: String,
}

/// The validated, immutable semantic model.
#[derive(Debug, Clone)]
pub struct SemanticModel {
    pub(crate) fact_table: String,
    pub(crate) tables: Vec<TableInfo>,
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) metrics: Vec<Metric>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) join_graph: JoinGraph,
    pub(crate) calendar: CalendarConfig,
    pub(crate) row_security: Vec<RowSecurityRule>,
    pub(crate) default_drill_dimension: Option<String>,
    pub(crate) default_time_dimension: Option<String>,
    /// Lower-cased canonical name → index.
    pub(crate) dimension_names: HashMap<String, usize>,
    /// Lower-cased synonym → index.
    pub(crate) dimension_synonyms: HashMap<String, usize>,
    pub(crate) metric_names: HashMap<String, usize>,
    pub(crate) metric_synonyms: HashMap<String, usize>,
}

impl SemanticModel {
    /// Parse and validate a TOML model definition.
    pub fn from_toml_str(source: &str) -> ModelResult<Self> {
        let doc: ModelDocument = toml::from_str(source)?;
        doc.into_model()
    }

    /// Load and validate a TOML model file.
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn fact_table(&self) -> &str {
        &self.fact_table
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    /// Tables holding at least one dimension, excluding the fact table.
    pub fn dimension_tables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for dim in &self.dimensions {
            if dim.table != self.fact_table && !out.contains(&dim.table.as_str()) {
                out.push(&dim.table);
            }
        }
        out
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn join_graph(&self) -> &JoinGraph {
        &self.join_graph
    }

    pub fn calendar(&self) -> &CalendarConfig {
        &self.calendar
    }

    pub fn row_security(&self) -> &[RowSecurityRule] {
        &self.row_security
    }

    /// Resolve a dimension token: canonical name first, then synonyms.
    /// Matching is case-insensitive.
    pub fn resolve_dimension(&self, token: &str) -> Option<&Dimension> {
        let key = token.trim().to_lowercase();
        self.dimension_names
            .get(&key)
            .or_else(|| self.dimension_synonyms.get(&key))
            .map(|&i| &self.dimensions[i])
    }

    /// Resolve a metric token: canonical name first, then synonyms.
    pub fn resolve_metric(&self, token: &str) -> Option<&Metric> {
        let key = token.trim().to_lowercase();
        self.metric_names
            .get(&key)
            .or_else(|| self.metric_synonyms.get(&key))
            .map(|&i| &self.metrics[i])
    }

    /// Dimension bound to a physical column, if any.
    pub fn dimension_for_column(&self, table: &str, column: &str) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.table == table && d.column == column)
    }

    pub fn default_drill_dimension(&self) -> Option<&Dimension> {
        self.default_drill_dimension
            .as_deref()
            .and_then(|name| self.resolve_dimension(name))
    }

    pub fn default_time_dimension(&self) -> Option<&Dimension> {
        self.default_time_dimension
            .as_deref()
            .and_then(|name| self.resolve_dimension(name))
    }

    /// Join path from the fact table to `table`.
    pub fn join_path(&self, table: &str) -> Option<Vec<JoinStep>> {
        self.join_graph
            .path(&self.fact_table, table, &self.relationships)
    }
}
