//! Cost gate: reject queries whose projected scan or output size exceeds the
//! caller's role limits, before anything runs.
//!
//! The estimator reads the built [`Query`](crate::sql::Query) and the model's
//! table statistics. It never rewrites the query; a rejection lists every
//! violated limit with a remediation hint.

mod estimator;

pub use estimator::{CostEstimate, CostEstimator};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ceilings for one cost tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleLimits {
    pub max_output_rows: u64,
    pub max_scan_bytes: u64,
    pub max_joins: usize,
}

impl Default for RoleLimits {
    fn default() -> Self {
        Self {
            max_output_rows: 100_000,
            max_scan_bytes: 50_000_000_000,
            max_joins: 8,
        }
    }
}

/// Which ceiling was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    MaxOutputRows,
    MaxScanBytes,
    MaxJoins,
}

/// One exceeded limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub limit: LimitKind,
    pub estimated: u64,
    pub allowed: u64,
    pub remediation: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.limit {
            LimitKind::MaxOutputRows => "output rows",
            LimitKind::MaxScanBytes => "scanned bytes",
            LimitKind::MaxJoins => "joins",
        };
        write!(
            f,
            "estimated {} {} exceeds the limit of {} ({})",
            self.estimated, what, self.allowed, self.remediation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostError {
    #[error("query too expensive: {}", join_violations(.violations))]
    QueryTooExpensive { violations: Vec<Violation> },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type CostResult<T> = Result<T, CostError>;
