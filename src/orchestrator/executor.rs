//! Boundary to the database.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::planner::CompiledQuery;

/// Errors reported by a [`QueryExecutor`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("query execution failed: {0}")]
    Failed(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("query timed out after {0} ms")]
    Timeout(u64),
}

/// Rows returned by the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: f64,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms: 0.0,
        }
    }

    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Runs compiled queries.
///
/// Implementations must send `query.sql` with `query.params` bound, never
/// `display_sql`.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, ExecutionError>;
}
