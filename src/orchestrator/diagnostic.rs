//! Diagnostic fan-out: the sub-intents that explain a metric's change.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::DiagnosticSettings;
use crate::intent::{Intent, IntentKind, SortDirection};
use crate::model::SemanticModel;
use crate::validation::ResolvedIntent;
use crate::Error;

use super::PlannedQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubQueryKind {
    /// Target metric over the trend dimension.
    Trend,
    /// Target metric by the default drill dimension.
    Contribution,
    /// Distribution metric, current against baseline.
    Coverage,
    /// Special-condition metric, current against baseline.
    Exception,
}

impl SubQueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubQueryKind::Trend => "trend",
            SubQueryKind::Contribution => "contribution",
            SubQueryKind::Coverage => "coverage",
            SubQueryKind::Exception => "exception",
        }
    }
}

impl fmt::Display for SubQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// A sub-query failed to build, was too expensive, or failed to run.
    /// The whole diagnostic is abandoned.
    #[error("{kind} sub-query failed: {source}")]
    SubQuery {
        kind: SubQueryKind,
        #[source]
        source: Box<Error>,
    },

    #[error("model has no default drill dimension for the contribution breakdown")]
    NoDrillDimension,

    #[error("{kind} result is malformed: {reason}")]
    MalformedResult { kind: SubQueryKind, reason: String },
}

impl DiagnosticError {
    pub(crate) fn sub_query(kind: SubQueryKind, source: impl Into<Error>) -> Self {
        DiagnosticError::SubQuery {
            kind,
            source: Box::new(source.into()),
        }
    }
}

/// A built and cost-approved diagnostic sub-query.
#[derive(Debug, Clone, Serialize)]
pub struct SubQuery {
    pub kind: SubQueryKind,
    pub query: PlannedQuery,
}

/// Sub-intents for a resolved diagnostic, in execution order.
///
/// Each keeps the caller's filters and both time windows. Coverage and
/// exception are omitted unless configured.
pub(crate) fn sub_intents(
    resolved: &ResolvedIntent,
    model: &SemanticModel,
    settings: &DiagnosticSettings,
) -> Result<Vec<(SubQueryKind, Intent)>, DiagnosticError> {
    let mut base = resolved.to_intent();
    base.kind = IntentKind::Query;
    base.metrics.clear();
    base.dimensions.clear();
    base.sort.clear();
    base.limit = None;

    let target = resolved.metrics.first().cloned().unwrap_or_default();
    let trend_dimension = settings
        .trend_dimension
        .clone()
        .or_else(|| resolved.time_range.as_ref().map(|r| r.dimension.clone()))
        .unwrap_or_default();
    let drill = model
        .default_drill_dimension()
        .ok_or(DiagnosticError::NoDrillDimension)?;

    let mut out = vec![
        (
            SubQueryKind::Trend,
            base.clone()
                .metric(&target)
                .dimension(&trend_dimension)
                .sort(&trend_dimension, SortDirection::Asc),
        ),
        (
            SubQueryKind::Contribution,
            base.clone().metric(&target).dimension(&drill.name),
        ),
    ];
    if let Some(metric) = &settings.coverage_metric {
        out.push((SubQueryKind::Coverage, base.clone().metric(metric)));
    }
    if let Some(metric) = &settings.exception_metric {
        out.push((SubQueryKind::Exception, base.clone().metric(metric)));
    }
    Ok(out)
}
