//! # Vantage
//!
//! Compiles analytical intents into parameter-bound, multi-dialect SQL over
//! a declarative semantic model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Intent (metrics, dimensions, filters, time)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation + time]
//! ┌─────────────────────────────────────────────────────────┐
//! │     ResolvedIntent (canonical names, typed values,       │
//! │     absolute windows, row-level security)                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Query AST -> SQL + bound parameters                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cost gate]
//! ┌─────────────────────────────────────────────────────────┐
//! │     QueryExecutor (single query or diagnostic fan-out)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`orchestrator`] drives a request through these stages.

pub mod config;
pub mod error;
pub mod intent;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod sql;
pub mod time;
pub mod validation;

pub use error::{Error, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{Error, Result};
    pub use crate::intent::{
        Filter, FilterOperator, Intent, IntentKind, SortDirection, SortSpec, TimeRange,
    };
    pub use crate::model::SemanticModel;
    pub use crate::orchestrator::{
        Orchestrator, Outcome, Plan, QueryExecutor, RequestState, Response, ResultSet,
    };
    pub use crate::planner::{CompiledQuery, CostEstimator, QueryBuilder, RoleLimits};
    pub use crate::sql::{Dialect, Literal};
    pub use crate::validation::{UserContext, Validator};
}
