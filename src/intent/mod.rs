//! Structured analytical intent.
//!
//! An [`Intent`] is the only input the compiler accepts from upstream
//! extraction: metric and dimension names, filters, an optional time window
//! and ordering. Names are unresolved tokens here; the validator maps them to
//! canonical model entries and produces a separate resolved value.
//!
//! ```json
//! {
//!   "metrics": ["revenue"],
//!   "dimensions": ["area"],
//!   "filters": [{ "dimension": "state", "operator": "IN", "value": ["CA", "NY"] }],
//!   "time_range": { "relative": "last_quarter" },
//!   "sort": [{ "field": "revenue", "direction": "desc" }],
//!   "limit": 10
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// What the caller wants done with the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// A single aggregate or listing query.
    #[default]
    Query,
    /// A "why did this change" investigation.
    Diagnostic,
}

/// Unresolved analytical request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Intent {
    pub kind: IntentKind,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<Filter>,
    pub time_range: Option<TimeRange>,
    /// Baseline window for comparisons. Diagnostics default to the period
    /// immediately preceding `time_range`.
    pub compare_to: Option<TimeRange>,
    pub sort: Vec<SortSpec>,
    pub limit: Option<u64>,
}

impl Intent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostic(mut self) -> Self {
        self.kind = IntentKind::Diagnostic;
        self
    }

    pub fn metric(mut self, name: &str) -> Self {
        self.metrics.push(name.into());
        self
    }

    pub fn dimension(mut self, name: &str) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn compare_to(mut self, range: TimeRange) -> Self {
        self.compare_to = Some(range);
        self
    }

    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.push(SortSpec {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// A predicate on one dimension.
///
/// `value` is kept as raw JSON until validation coerces it against the
/// dimension's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub dimension: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(dimension: &str, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            dimension: dimension.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Like,
    Between,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::Like => "LIKE",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that take a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::Between
        )
    }

    /// Operators that ignore the value.
    pub fn is_nullary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    /// Symbols and words, case-insensitive; `_` and runs of spaces are
    /// interchangeable (`not in`, `NOT_IN`, `is  null`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        Ok(match normalized.as_str() {
            "=" | "==" | "eq" => FilterOperator::Eq,
            "!=" | "<>" | "ne" | "neq" => FilterOperator::Ne,
            ">" | "gt" => FilterOperator::Gt,
            "<" | "lt" => FilterOperator::Lt,
            ">=" | "gte" => FilterOperator::Gte,
            "<=" | "lte" => FilterOperator::Lte,
            "in" => FilterOperator::In,
            "not in" => FilterOperator::NotIn,
            "like" => FilterOperator::Like,
            "between" => FilterOperator::Between,
            "is null" => FilterOperator::IsNull,
            "is not null" => FilterOperator::IsNotNull,
            _ => return Err(UnknownOperator(s.into())),
        })
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = UnknownOperator;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().into()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time window, either relative (`last_quarter`) or an explicit pair.
///
/// When `relative` is set it decides the window; `start`/`end` are only read
/// when it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeRange {
    /// Temporal dimension to constrain; the model default when absent.
    pub dimension: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub relative: Option<String>,
}

impl TimeRange {
    pub fn relative(token: &str) -> Self {
        Self {
            relative: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn between(start: &str, end: &str) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            ..Self::default()
        }
    }

    pub fn on(mut self, dimension: &str) -> Self {
        self.dimension = Some(dimension.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering on an output column (metric or dimension name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}
