//! Errors raised while loading or validating a semantic model.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// A semantic model definition that cannot be turned into a registry.
///
/// Every variant is a configuration defect: none of them depend on a
/// caller's intent.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {kind} identifier '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("duplicate {kind} '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} name '{name}' is reserved for the comparison period column")]
    ReservedName { kind: &'static str, name: String },

    #[error("'{name}' names both a metric and a dimension")]
    MetricDimensionClash { name: String },

    #[error("synonym '{synonym}' of {kind} '{owner}' collides with '{other}'")]
    SynonymCollision {
        kind: &'static str,
        synonym: String,
        owner: String,
        other: String,
    },

    #[error("{owner} references unregistered table '{table}'")]
    UnknownTable { owner: String, table: String },

    #[error("metric '{metric}' expression references table '{table}' not listed in its tables")]
    UndeclaredExpressionTable { metric: String, table: String },

    #[error("metric '{metric}' has an invalid expression: {message}")]
    InvalidExpression { metric: String, message: String },

    #[error("invalid column reference '{0}', expected table.column")]
    InvalidColumnRef(String),

    #[error("duplicate relationship between '{left}' and '{right}'")]
    DuplicateRelationship { left: String, right: String },

    #[error("table '{table}' is reachable through more than one join path")]
    AmbiguousJoinPath { table: String },

    #[error("{context} names unknown dimension '{name}'")]
    UnknownDimension { context: &'static str, name: String },

    #[error("default time dimension '{name}' is not temporal")]
    NonTemporalDefault { name: String },

    #[error("invalid calendar: {0}")]
    InvalidCalendar(String),
}
