//! Request orchestration.
//!
//! A request moves through a fixed state machine:
//!
//! ```text
//! Received -> Validated -> SingleBuild      -> Executed -> Synthesized -> Done
//!                       \-> DiagnosticFanout -/
//! ```
//!
//! and may fail from any state. The visited states come back with the
//! outcome. A diagnostic builds and cost-checks every sub-query before any
//! runs; sub-queries then run concurrently and the first failure cancels
//! the rest. A failed diagnostic yields no report.

pub mod diagnostic;
pub mod executor;
pub mod synthesis;

pub use diagnostic::{DiagnosticError, SubQuery, SubQueryKind};
pub use executor::{ExecutionError, QueryExecutor, ResultSet};
pub use synthesis::{Cause, DiagnosticReport, Severity, TrendPoint};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{CostSettings, DiagnosticSettings, Settings};
use crate::intent::{Intent, IntentKind};
use crate::model::SemanticModel;
use crate::planner::{CompiledQuery, CostEstimate, CostEstimator, QueryBuilder};
use crate::sql::Dialect;
use crate::time::TimeResolver;
use crate::validation::{RequiredTables, ResolvedIntent, UserContext, Validator};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Validated,
    SingleBuild,
    DiagnosticFanout,
    Executed,
    Synthesized,
    Done,
    Failed(String),
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Received => f.write_str("received"),
            RequestState::Validated => f.write_str("validated"),
            RequestState::SingleBuild => f.write_str("single_build"),
            RequestState::DiagnosticFanout => f.write_str("diagnostic_fanout"),
            RequestState::Executed => f.write_str("executed"),
            RequestState::Synthesized => f.write_str("synthesized"),
            RequestState::Done => f.write_str("done"),
            RequestState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// States visited by one request.
#[derive(Debug, Default)]
struct Trace(Vec<RequestState>);

impl Trace {
    fn enter(&mut self, state: RequestState) {
        info!(state = %state, "state transition");
        self.0.push(state);
    }
}

/// A validated, built and cost-approved query.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedQuery {
    pub resolved: ResolvedIntent,
    pub compiled: CompiledQuery,
    pub cost: CostEstimate,
}

/// Result of [`Orchestrator::plan`]: everything short of execution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plan {
    Single(PlannedQuery),
    Diagnostic {
        resolved: ResolvedIntent,
        sub_queries: Vec<SubQuery>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: PlannedQuery,
    pub result: ResultSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResponse {
    pub resolved: ResolvedIntent,
    pub sub_queries: Vec<SubQuery>,
    pub report: DiagnosticReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Query(QueryResponse),
    Diagnostic(DiagnosticResponse),
}

/// Outcome of [`Orchestrator::run`], successful or not.
#[derive(Debug)]
pub struct Outcome {
    pub request_id: Uuid,
    pub trace: Vec<RequestState>,
    pub result: Result<Response>,
}

impl Outcome {
    pub fn final_state(&self) -> Option<&RequestState> {
        self.trace.last()
    }

    pub fn into_result(self) -> Result<Response> {
        self.result
    }
}

/// Drives intents through validation, building, the cost gate and the
/// executor.
pub struct Orchestrator {
    model: Arc<SemanticModel>,
    executor: Arc<dyn QueryExecutor>,
    dialect: Dialect,
    cost: CostSettings,
    diagnostics: DiagnosticSettings,
    timeout: Duration,
    today: Option<NaiveDate>,
}

impl Orchestrator {
    pub fn new(model: Arc<SemanticModel>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            model,
            executor,
            dialect: Dialect::default(),
            cost: CostSettings::default(),
            diagnostics: DiagnosticSettings::default(),
            timeout: Duration::from_secs(30),
            today: None,
        }
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.dialect = settings.dialect;
        self.cost = settings.cost.clone();
        self.diagnostics = settings.diagnostics.clone();
        self.timeout = Duration::from_millis(settings.query_timeout_ms);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Anchor relative time ranges on `today` instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    fn validator(&self) -> Validator<'_> {
        match self.today {
            Some(today) => Validator::with_time_resolver(
                &self.model,
                TimeResolver::new(*self.model.calendar(), today),
            ),
            None => Validator::new(&self.model),
        }
    }

    /// Validate, build and cost-check without executing.
    pub fn plan(&self, intent: &Intent, user: &UserContext) -> Result<Plan> {
        let validator = self.validator();
        let (resolved, tables) = validator.validate(intent, user)?;
        match resolved.kind {
            IntentKind::Query => Ok(Plan::Single(self.build(resolved, &tables, user)?)),
            IntentKind::Diagnostic => {
                let sub_queries = self.fan_out(&validator, &resolved, user)?;
                Ok(Plan::Diagnostic {
                    resolved,
                    sub_queries,
                })
            }
        }
    }

    pub async fn run(&self, intent: &Intent, user: &UserContext) -> Outcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("request", %request_id, user = %user.user_id);

        async move {
            let mut trace = Trace::default();
            trace.enter(RequestState::Received);

            let result = self.drive(intent, user, &mut trace).await;
            match &result {
                Ok(_) => trace.enter(RequestState::Done),
                Err(e) => {
                    warn!(error = %e, "request failed");
                    trace.enter(RequestState::Failed(e.to_string()));
                }
            }

            Outcome {
                request_id,
                trace: trace.0,
                result,
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        intent: &Intent,
        user: &UserContext,
        trace: &mut Trace,
    ) -> Result<Response> {
        let validator = self.validator();
        let (resolved, tables) = validator.validate(intent, user)?;
        trace.enter(RequestState::Validated);

        match resolved.kind {
            IntentKind::Query => {
                trace.enter(RequestState::SingleBuild);
                let query = self.build(resolved, &tables, user)?;

                let result = self.execute(&query.compiled).await?;
                trace.enter(RequestState::Executed);
                info!(rows = result.row_count, "query executed");

                trace.enter(RequestState::Synthesized);
                Ok(Response::Query(QueryResponse { query, result }))
            }
            IntentKind::Diagnostic => {
                trace.enter(RequestState::DiagnosticFanout);
                let sub_queries = self.fan_out(&validator, &resolved, user)?;

                let results = try_join_all(sub_queries.iter().map(|sub| async move {
                    self.execute(&sub.query.compiled)
                        .await
                        .map_err(|e| DiagnosticError::sub_query(sub.kind, e))
                }))
                .await?;
                trace.enter(RequestState::Executed);

                let metric = resolved.metrics.first().map(String::as_str).unwrap_or_default();
                let report =
                    synthesis::synthesize(metric, &sub_queries, &results, &self.diagnostics)?;
                trace.enter(RequestState::Synthesized);
                info!(causes = report.causes.len(), "diagnostic synthesized");

                Ok(Response::Diagnostic(DiagnosticResponse {
                    resolved,
                    sub_queries,
                    report,
                }))
            }
        }
    }

    async fn execute(&self, query: &CompiledQuery) -> std::result::Result<ResultSet, ExecutionError> {
        match tokio::time::timeout(self.timeout, self.executor.execute(query)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn build(
        &self,
        resolved: ResolvedIntent,
        tables: &RequiredTables,
        user: &UserContext,
    ) -> Result<PlannedQuery> {
        let compiled = QueryBuilder::new(&self.model)
            .with_dialect(self.dialect)
            .build(&resolved, tables)?;
        let limits = self.cost.limits_for(&user.cost_tier);
        let cost = CostEstimator::new(&self.model).check(&compiled.query, &limits)?;

        debug!(
            cache_key = %compiled.cache_key(),
            scan_bytes = cost.scan_bytes,
            output_rows = cost.output_rows,
            "query planned"
        );
        Ok(PlannedQuery {
            resolved,
            compiled,
            cost,
        })
    }

    /// Build every diagnostic sub-query. Any failure abandons the lot.
    fn fan_out(
        &self,
        validator: &Validator<'_>,
        resolved: &ResolvedIntent,
        user: &UserContext,
    ) -> Result<Vec<SubQuery>> {
        let intents = diagnostic::sub_intents(resolved, &self.model, &self.diagnostics)?;

        let mut sub_queries = Vec::with_capacity(intents.len());
        for (kind, intent) in intents {
            let planned = validator
                .validate(&intent, user)
                .map_err(Error::from)
                .and_then(|(resolved, tables)| self.build(resolved, &tables, user))
                .map_err(|e| DiagnosticError::sub_query(kind, e))?;
            sub_queries.push(SubQuery {
                kind,
                query: planned,
            });
        }

        info!(
            sub_queries = sub_queries.len(),
            "diagnostic fan-out built"
        );
        Ok(sub_queries)
    }
}
