use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use vantage::config::Settings;
use vantage::intent::{Intent, TimeRange};
use vantage::model::SemanticModel;
use vantage::orchestrator::{
    DiagnosticError, ExecutionError, Orchestrator, Plan, QueryExecutor, RequestState, Response,
    ResultSet, Severity, SubQueryKind,
};
use vantage::planner::{CompiledQuery, RoleLimits};
use vantage::validation::{UserContext, ValidationError};
use vantage::Error;

const RETAIL: &str = include_str!("../fixtures/retail.toml");

/// Answers by the first output column and records every SQL it sees.
#[derive(Default)]
struct RetailDatabase {
    executed: Mutex<Vec<String>>,
    fail_first_column: Option<&'static str>,
    delay: Option<Duration>,
}

impl RetailDatabase {
    fn failing_on(column: &'static str) -> Self {
        Self {
            fail_first_column: Some(column),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for RetailDatabase {
    async fn execute(&self, query: &CompiledQuery) -> Result<ResultSet, ExecutionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed.lock().unwrap().push(query.sql.clone());

        let columns: Vec<String> = query.column_names().into_iter().map(String::from).collect();
        let first = columns.first().map(String::as_str).unwrap_or_default();
        if Some(first) == self.fail_first_column {
            return Err(ExecutionError::Failed(format!("relation for {first} is locked")));
        }

        let data: Vec<Vec<Value>> = match first {
            "sale_date" => vec![
                vec![json!("2024-03-01"), json!("baseline"), json!(200.0)],
                vec![json!("2024-04-01"), json!("current"), json!(150.0)],
            ],
            "region" if columns.len() == 3 => vec![
                vec![json!("East"), json!("current"), json!(45)],
                vec![json!("East"), json!("baseline"), json!(100)],
                vec![json!("West"), json!("current"), json!(105)],
                vec![json!("West"), json!("baseline"), json!(100)],
            ],
            "region" => vec![
                vec![json!("East"), json!(1200.5)],
                vec![json!("West"), json!(980.0)],
            ],
            "period" => vec![
                vec![json!("current"), json!(90)],
                vec![json!("baseline"), json!(100)],
            ],
            _ => Vec::new(),
        };
        Ok(ResultSet::new(columns, data).with_execution_time(1.5))
    }
}

fn settings(diagnostics: &str) -> Settings {
    Settings::from_toml_str(&format!("[diagnostics]\n{diagnostics}")).unwrap()
}

fn orchestrator(db: Arc<RetailDatabase>, settings: &Settings) -> Orchestrator {
    let model = Arc::new(SemanticModel::from_toml_str(RETAIL).unwrap());
    Orchestrator::new(model, db)
        .with_settings(settings)
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap())
}

fn why_did_sales_drop() -> Intent {
    Intent::new()
        .diagnostic()
        .metric("revenue")
        .time_range(TimeRange::relative("last_month"))
}

fn failed(state: Option<&RequestState>) -> bool {
    matches!(state, Some(RequestState::Failed(_)))
}

#[tokio::test]
async fn test_single_query_trace() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(db.clone(), &Settings::default());

    let outcome = orch
        .run(
            &Intent::new().metric("total_sales").dimension("region"),
            &UserContext::new("analyst-1"),
        )
        .await;

    assert_eq!(
        outcome.trace,
        [
            RequestState::Received,
            RequestState::Validated,
            RequestState::SingleBuild,
            RequestState::Executed,
            RequestState::Synthesized,
            RequestState::Done,
        ]
    );
    let Response::Query(response) = outcome.into_result().unwrap() else {
        panic!("expected a query response");
    };
    assert_eq!(response.result.row_count, 2);
    assert_eq!(response.query.cost.output_rows, 4);
    assert_eq!(db.executed(), [response.query.compiled.sql.clone()]);
}

#[tokio::test]
async fn test_diagnostic_report() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(db.clone(), &settings("coverage_metric = \"active_customers\""));

    let outcome = orch
        .run(&why_did_sales_drop(), &UserContext::new("analyst-1"))
        .await;

    assert_eq!(
        outcome.trace,
        [
            RequestState::Received,
            RequestState::Validated,
            RequestState::DiagnosticFanout,
            RequestState::Executed,
            RequestState::Synthesized,
            RequestState::Done,
        ]
    );
    let Response::Diagnostic(response) = outcome.into_result().unwrap() else {
        panic!("expected a diagnostic response");
    };
    assert_eq!(db.executed().len(), 3);

    let kinds: Vec<SubQueryKind> = response.sub_queries.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        [
            SubQueryKind::Trend,
            SubQueryKind::Contribution,
            SubQueryKind::Coverage
        ]
    );

    let report = response.report;
    assert_eq!(report.metric, "total_sales");
    assert_eq!(report.current, 150.0);
    assert_eq!(report.baseline, 200.0);
    assert_eq!(report.trend.len(), 2);
    let labels: Vec<&str> = report.causes.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["region = East", "active_customers", "region = West"]);
    assert_eq!(report.causes[0].severity, Severity::High);
    assert_eq!(
        report.summary,
        "total_sales fell from 200.00 to 150.00 (-25.0%); top cause: region = East (HIGH)"
    );
}

#[tokio::test]
async fn test_misconfigured_trend_aborts_diagnostic() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(db.clone(), &settings("trend_dimension = \"fiscal_week\""));

    let outcome = orch
        .run(&why_did_sales_drop(), &UserContext::new("analyst-1"))
        .await;

    assert_eq!(
        &outcome.trace[..3],
        [
            RequestState::Received,
            RequestState::Validated,
            RequestState::DiagnosticFanout,
        ]
    );
    assert!(failed(outcome.final_state()));
    assert!(db.executed().is_empty());

    match outcome.into_result() {
        Err(Error::Diagnostic(DiagnosticError::SubQuery { kind, source })) => {
            assert_eq!(kind, SubQueryKind::Trend);
            assert!(matches!(
                *source,
                Error::Validation(ValidationError::UnknownDimension(ref name)) if name == "fiscal_week"
            ));
        }
        other => panic!("expected a trend failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_trend_execution_yields_no_report() {
    let db = Arc::new(RetailDatabase::failing_on("sale_date"));
    let orch = orchestrator(db, &Settings::default());

    let outcome = orch
        .run(&why_did_sales_drop(), &UserContext::new("analyst-1"))
        .await;

    assert!(!outcome.trace.contains(&RequestState::Executed));
    assert!(!outcome.trace.contains(&RequestState::Synthesized));
    assert!(failed(outcome.final_state()));
    assert!(matches!(
        outcome.into_result(),
        Err(Error::Diagnostic(DiagnosticError::SubQuery {
            kind: SubQueryKind::Trend,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_validation_failure_stops_before_build() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(db.clone(), &Settings::default());

    let outcome = orch
        .run(
            &Intent::new().metric("bogus_metric"),
            &UserContext::new("analyst-1"),
        )
        .await;

    assert_eq!(outcome.trace.len(), 2);
    assert_eq!(outcome.trace[0], RequestState::Received);
    assert!(failed(outcome.final_state()));
    assert!(db.executed().is_empty());
    let err = outcome.into_result().unwrap_err();
    assert!(err.to_string().contains("bogus_metric"));
}

#[tokio::test]
async fn test_cost_rejection_never_executes() {
    let db = Arc::new(RetailDatabase::default());
    let mut settings = Settings::default();
    settings.cost.tiers.insert(
        "trial".into(),
        RoleLimits {
            max_scan_bytes: 1_000,
            ..RoleLimits::default()
        },
    );
    let orch = orchestrator(db.clone(), &settings);

    let outcome = orch
        .run(
            &Intent::new().metric("total_sales"),
            &UserContext::new("guest").with_cost_tier("trial"),
        )
        .await;

    assert!(outcome.trace.contains(&RequestState::SingleBuild));
    assert!(matches!(outcome.result, Err(Error::CostLimit(_))));
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_slow_query_times_out() {
    let db = Arc::new(RetailDatabase::slow(Duration::from_millis(500)));
    let orch = orchestrator(db, &Settings::default()).with_timeout(Duration::from_millis(20));

    let outcome = orch
        .run(&Intent::new().metric("total_sales"), &UserContext::new("analyst-1"))
        .await;

    assert!(matches!(
        outcome.result,
        Err(Error::Execution(ExecutionError::Timeout(20)))
    ));
}

#[test]
fn test_plan_without_executing() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(
        db.clone(),
        &settings("coverage_metric = \"active_customers\"\nexception_metric = \"return_count\""),
    );

    let plan = orch
        .plan(&why_did_sales_drop(), &UserContext::new("analyst-1"))
        .unwrap();
    let Plan::Diagnostic { sub_queries, .. } = plan else {
        panic!("expected a diagnostic plan");
    };
    assert_eq!(sub_queries.len(), 4);
    assert_eq!(sub_queries[3].kind, SubQueryKind::Exception);
    for sub in &sub_queries {
        assert!(sub.query.compiled.sql.contains("BETWEEN $1 AND $2"));
        assert!(sub.query.compiled.column_names().contains(&"period"));
    }
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_requests_get_distinct_ids() {
    let orch = orchestrator(Arc::new(RetailDatabase::default()), &Settings::default());
    let intent = Intent::new().metric("total_sales");
    let user = UserContext::new("analyst-1");

    let a = orch.run(&intent, &user).await;
    let b = orch.run(&intent, &user).await;
    assert_ne!(a.request_id, b.request_id);
}

#[tokio::test]
async fn test_average_metric_is_not_diagnosed() {
    let db = Arc::new(RetailDatabase::default());
    let orch = orchestrator(db.clone(), &Settings::default());

    let outcome = orch
        .run(
            &Intent::new()
                .diagnostic()
                .metric("average sale")
                .time_range(TimeRange::relative("last_month")),
            &UserContext::new("analyst-1"),
        )
        .await;

    assert_eq!(outcome.trace.len(), 2);
    assert!(failed(outcome.final_state()));
    assert!(db.executed().is_empty());
    assert!(matches!(
        outcome.into_result(),
        Err(Error::Validation(ValidationError::NonAdditiveDiagnostic { ref metric, .. })) if metric == "avg_sale"
    ));
}
