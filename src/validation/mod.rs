//! Semantic validation of intents.
//!
//! The validator turns a raw [`Intent`] into a [`ResolvedIntent`]: every
//! token is mapped to its canonical model entry, filter values are coerced
//! to the dimension's type, time windows are made absolute, and the caller's
//! row-level security filters are attached last. It also reports the tables
//! the query needs, seeded with the fact table.
//!
//! The model is only read. A resolved intent converts back with
//! [`ResolvedIntent::to_intent`], and validating that again yields the same
//! resolved value.

mod coerce;
mod security;

pub use security::UserContext;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::intent::{
    Filter, FilterOperator, Intent, IntentKind, SortDirection, SortSpec, TimeRange,
};
use crate::model::{Aggregation, Dimension, SemanticModel};
use crate::sql::Literal;
use crate::time::{TimeRangeError, TimeResolver};

/// Errors surfaced verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    #[error("unknown time dimension '{0}'")]
    UnknownTimeDimension(String),

    #[error("dimension '{0}' is not temporal and cannot carry a time range")]
    NonTemporalDimension(String),

    #[error("time range names no dimension and the model has no default time dimension")]
    NoTimeDimension,

    #[error("sort field '{0}' is not a requested metric or dimension")]
    InvalidSortField(String),

    #[error("invalid value for filter on '{dimension}': {reason}")]
    InvalidFilterValue { dimension: String, reason: String },

    #[error("intent requests no metrics and no dimensions")]
    EmptyIntent,

    #[error("limit must be at least 1")]
    InvalidLimit,

    #[error("a diagnostic needs a target metric")]
    DiagnosticWithoutMetric,

    #[error("a diagnostic needs a time range")]
    DiagnosticWithoutTimeRange,

    #[error("cannot diagnose '{metric}': {aggregation:?} is not additive across members")]
    NonAdditiveDiagnostic {
        metric: String,
        aggregation: Aggregation,
    },

    #[error("compare_to needs a time range to compare against")]
    ComparisonWithoutTimeRange,

    #[error("permission denied: caller has no '{scope}' scope")]
    PermissionDenied { scope: String },

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// A filter bound to a canonical dimension with typed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFilter {
    pub dimension: String,
    pub operator: FilterOperator,
    pub values: Vec<Literal>,
}

/// An absolute, closed time window on a temporal dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTimeRange {
    pub dimension: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Relative token the window came from, normalized.
    pub relative: Option<String>,
}

impl ResolvedTimeRange {
    pub fn label(&self) -> String {
        match &self.relative {
            Some(token) => token.clone(),
            None => format!("{} to {}", self.start, self.end),
        }
    }
}

/// Validated intent: canonical names only, nothing left to resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedIntent {
    pub kind: IntentKind,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<ResolvedFilter>,
    pub time_range: Option<ResolvedTimeRange>,
    /// Baseline window; when present the query is split into `current` and
    /// `baseline` periods.
    pub comparison: Option<ResolvedTimeRange>,
    pub sort: Vec<SortSpec>,
    pub limit: Option<u64>,
    /// Row-level security restrictions, rendered after every other
    /// predicate.
    pub security_filters: Vec<ResolvedFilter>,
}

impl ResolvedIntent {
    /// Back to the unresolved form. Security filters are dropped since
    /// validation derives them from the caller again.
    pub fn to_intent(&self) -> Intent {
        Intent {
            kind: self.kind,
            metrics: self.metrics.clone(),
            dimensions: self.dimensions.clone(),
            filters: self
                .filters
                .iter()
                .map(|f| Filter {
                    dimension: f.dimension.clone(),
                    operator: f.operator,
                    value: filter_value_to_json(f),
                })
                .collect(),
            time_range: self.time_range.as_ref().map(time_range_to_intent),
            compare_to: self.comparison.as_ref().map(time_range_to_intent),
            sort: self.sort.clone(),
            limit: self.limit,
        }
    }

    /// Whether `name` is an output column of this intent.
    pub fn has_output(&self, name: &str) -> bool {
        self.metrics.iter().any(|m| m == name) || self.dimensions.iter().any(|d| d == name)
    }
}

fn literal_to_json(value: &Literal) -> Value {
    match value {
        Literal::Int(n) => Value::from(*n),
        Literal::Float(x) => Value::from(*x),
        Literal::String(s) => Value::from(s.as_str()),
        Literal::Bool(b) => Value::from(*b),
        Literal::Null => Value::Null,
        Literal::Date(d) => Value::from(d.format("%Y-%m-%d").to_string()),
        Literal::Timestamp(ts) => Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    }
}

fn filter_value_to_json(f: &ResolvedFilter) -> Value {
    if f.operator.takes_list() {
        Value::Array(f.values.iter().map(literal_to_json).collect())
    } else {
        f.values.first().map(literal_to_json).unwrap_or(Value::Null)
    }
}

fn time_range_to_intent(r: &ResolvedTimeRange) -> TimeRange {
    match &r.relative {
        Some(token) => TimeRange {
            dimension: Some(r.dimension.clone()),
            relative: Some(token.clone()),
            ..TimeRange::default()
        },
        None => TimeRange {
            dimension: Some(r.dimension.clone()),
            start: Some(r.start.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
            end: Some(r.end.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
            relative: None,
        },
    }
}

/// Tables a query touches, fact table first, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredTables(Vec<String>);

impl RequiredTables {
    pub fn new(fact_table: &str) -> Self {
        Self(vec![fact_table.to_string()])
    }

    pub fn add(&mut self, table: &str) {
        if !self.contains(table) {
            self.0.push(table.to_string());
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.0.iter().any(|t| t == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Resolves intents against one model.
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    model: &'a SemanticModel,
    time: TimeResolver,
}

impl<'a> Validator<'a> {
    /// Validator whose time windows are anchored on the local clock.
    pub fn new(model: &'a SemanticModel) -> Self {
        Self {
            model,
            time: TimeResolver::from_clock(*model.calendar()),
        }
    }

    pub fn with_time_resolver(model: &'a SemanticModel, time: TimeResolver) -> Self {
        Self { model, time }
    }

    pub fn model(&self) -> &'a SemanticModel {
        self.model
    }

    pub fn time_resolver(&self) -> &TimeResolver {
        &self.time
    }

    pub fn validate(
        &self,
        intent: &Intent,
        user: &UserContext,
    ) -> ValidationResult<(ResolvedIntent, RequiredTables)> {
        if intent.metrics.is_empty() && intent.dimensions.is_empty() {
            return Err(ValidationError::EmptyIntent);
        }
        if intent.limit == Some(0) {
            return Err(ValidationError::InvalidLimit);
        }

        let mut tables = RequiredTables::new(self.model.fact_table());

        let mut metrics: Vec<String> = Vec::new();
        for token in &intent.metrics {
            let metric = self
                .model
                .resolve_metric(token)
                .ok_or_else(|| ValidationError::UnknownMetric(token.clone()))?;
            if metrics.contains(&metric.name) {
                continue;
            }
            for table in &metric.tables {
                tables.add(table);
            }
            metrics.push(metric.name.clone());
        }

        let mut dimensions: Vec<String> = Vec::new();
        for token in &intent.dimensions {
            let dim = self.resolve_dimension(token)?;
            if dimensions.contains(&dim.name) {
                continue;
            }
            tables.add(&dim.table);
            dimensions.push(dim.name.clone());
        }

        let mut filters = Vec::with_capacity(intent.filters.len());
        for filter in &intent.filters {
            let dim = self.resolve_dimension(&filter.dimension)?;
            tables.add(&dim.table);
            filters.push(ResolvedFilter {
                dimension: dim.name.clone(),
                operator: filter.operator,
                values: coerce::filter_values(dim, filter.operator, &filter.value)?,
            });
        }

        let time_range = intent
            .time_range
            .as_ref()
            .map(|range| self.resolve_time_range(range))
            .transpose()?;
        if let Some(range) = &time_range {
            if let Some(dim) = self.model.resolve_dimension(&range.dimension) {
                tables.add(&dim.table);
            }
        }

        let comparison = match (&intent.compare_to, &intent.time_range, &time_range) {
            (Some(baseline), _, Some(current)) => {
                let mut resolved = self.resolve_time_range(baseline)?;
                resolved.dimension = current.dimension.clone();
                Some(resolved)
            }
            (Some(_), _, None) => return Err(ValidationError::ComparisonWithoutTimeRange),
            (None, Some(raw), Some(current)) if intent.kind == IntentKind::Diagnostic => {
                let (start, end) = self.time.previous_period(raw)?;
                Some(ResolvedTimeRange {
                    dimension: current.dimension.clone(),
                    start,
                    end,
                    relative: None,
                })
            }
            _ => None,
        };
        if let Some(range) = &comparison {
            if let Some(dim) = self.model.resolve_dimension(&range.dimension) {
                tables.add(&dim.table);
            }
        }

        if intent.kind == IntentKind::Diagnostic {
            if metrics.is_empty() {
                return Err(ValidationError::DiagnosticWithoutMetric);
            }
            if time_range.is_none() {
                return Err(ValidationError::DiagnosticWithoutTimeRange);
            }
            if let Some(target) = self.model.resolve_metric(&metrics[0]) {
                if !target.aggregation.is_additive() {
                    return Err(ValidationError::NonAdditiveDiagnostic {
                        metric: target.name.clone(),
                        aggregation: target.aggregation,
                    });
                }
            }
        }

        let mut sort = Vec::with_capacity(intent.sort.len());
        for spec in &intent.sort {
            let canonical = self
                .model
                .resolve_metric(&spec.field)
                .map(|m| m.name.as_str())
                .filter(|name| metrics.iter().any(|m| m == name))
                .or_else(|| {
                    self.model
                        .resolve_dimension(&spec.field)
                        .map(|d| d.name.as_str())
                        .filter(|name| dimensions.iter().any(|d| d == name))
                })
                .ok_or_else(|| ValidationError::InvalidSortField(spec.field.clone()))?;
            sort.push(SortSpec {
                field: canonical.to_string(),
                direction: spec.direction,
            });
        }

        let mut resolved = ResolvedIntent {
            kind: intent.kind,
            metrics,
            dimensions,
            filters,
            time_range,
            comparison,
            sort,
            limit: intent.limit,
            security_filters: Vec::new(),
        };

        // Last, so earlier errors never depend on the caller's scope.
        security::apply(self.model, user, &mut resolved, &mut tables)?;

        debug!(
            metrics = ?resolved.metrics,
            dimensions = ?resolved.dimensions,
            tables = ?tables.as_slice(),
            "intent validated"
        );
        Ok((resolved, tables))
    }

    fn resolve_dimension(&self, token: &str) -> ValidationResult<&'a Dimension> {
        self.model
            .resolve_dimension(token)
            .ok_or_else(|| ValidationError::UnknownDimension(token.to_string()))
    }

    fn resolve_time_range(&self, range: &TimeRange) -> ValidationResult<ResolvedTimeRange> {
        let dim = match &range.dimension {
            Some(token) => self
                .model
                .resolve_dimension(token)
                .ok_or_else(|| ValidationError::UnknownTimeDimension(token.clone()))?,
            None => self
                .model
                .default_time_dimension()
                .ok_or(ValidationError::NoTimeDimension)?,
        };
        if !dim.is_temporal {
            return Err(ValidationError::NonTemporalDimension(dim.name.clone()));
        }

        let (start, end) = self.time.resolve(range)?;
        let relative = match &range.relative {
            Some(token) => Some(token.parse::<crate::time::RelativePeriod>()?.to_string()),
            None => None,
        };
        Ok(ResolvedTimeRange {
            dimension: dim.name.clone(),
            start,
            end,
            relative,
        })
    }
}

/// Direction as rendered in explanations.
pub(crate) fn direction_label(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ascending",
        SortDirection::Desc => "descending",
    }
}
