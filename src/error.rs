//! Crate-level error.

use thiserror::Error;

use crate::config::SettingsError;
use crate::model::ModelError;
use crate::orchestrator::{DiagnosticError, ExecutionError};
use crate::planner::{CostError, PlanError};
use crate::time::TimeRangeError;
use crate::validation::ValidationError;

/// Any failure of a request or of loading the model and settings.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(ValidationError),

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    /// The model cannot join a required table. A configuration defect.
    ///
    /// Planner errors about the request itself convert to `Validation`.
    #[error("join planning failed: {0}")]
    JoinPath(PlanError),

    #[error(transparent)]
    CostLimit(#[from] CostError),

    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] SettingsError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TimeRange(e) => Error::TimeRange(e),
            other => Error::Validation(other),
        }
    }
}

impl From<PlanError> for Error {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::InvalidFilterArity { ref dimension, .. } => {
                Error::Validation(ValidationError::InvalidFilterValue {
                    dimension: dimension.clone(),
                    reason: err.to_string(),
                })
            }
            PlanError::UnknownName { kind: "metric", name } => {
                Error::Validation(ValidationError::UnknownMetric(name))
            }
            PlanError::UnknownName { name, .. } => {
                Error::Validation(ValidationError::UnknownDimension(name))
            }
            join => Error::JoinPath(join),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
