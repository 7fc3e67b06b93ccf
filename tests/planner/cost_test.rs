use chrono::NaiveDate;
use vantage::config::Settings;
use vantage::intent::{Intent, TimeRange};
use vantage::model::SemanticModel;
use vantage::planner::cost::LimitKind;
use vantage::planner::{CompiledQuery, CostError, CostEstimator, QueryBuilder, RoleLimits};
use vantage::time::TimeResolver;
use vantage::validation::{UserContext, Validator};

const RETAIL: &str = include_str!("../fixtures/retail.toml");

fn retail() -> SemanticModel {
    SemanticModel::from_toml_str(RETAIL).unwrap()
}

fn compile(model: &SemanticModel, intent: &Intent) -> CompiledQuery {
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
    let (resolved, tables) =
        Validator::with_time_resolver(model, TimeResolver::new(*model.calendar(), today))
            .validate(intent, &UserContext::default())
            .unwrap();
    QueryBuilder::new(model).build(&resolved, &tables).unwrap()
}

fn violations(model: &SemanticModel, intent: &Intent, limits: RoleLimits) -> Vec<(LimitKind, String)> {
    let compiled = compile(model, intent);
    match CostEstimator::new(model).check(&compiled.query, &limits) {
        Ok(_) => Vec::new(),
        Err(CostError::QueryTooExpensive { violations }) => violations
            .into_iter()
            .map(|v| (v.limit, v.remediation))
            .collect(),
    }
}

#[test]
fn test_full_scan_estimate() {
    let model = retail();
    let compiled = compile(&model, &Intent::new().metric("total_sales").dimension("region"));
    let est = CostEstimator::new(&model)
        .check(&compiled.query, &RoleLimits::default())
        .unwrap();

    assert_eq!(est.scanned_rows, 50_000_000);
    assert_eq!(est.scan_bytes, 6_000_000_000 + 100_000);
    assert_eq!(est.output_rows, 4);
    assert_eq!(est.joins, 1);
}

#[test]
fn test_time_window_prunes_fact_scan() {
    let model = retail();
    let compiled = compile(
        &model,
        &Intent::new()
            .metric("total_sales")
            .time_range(TimeRange::relative("last_quarter")),
    );
    let est = CostEstimator::new(&model).estimate(&compiled.query);
    assert_eq!(est.scanned_rows, 16_500_000);
    assert_eq!(est.scan_bytes, 1_980_000_000);
    assert_eq!(est.output_rows, 1);
}

#[test]
fn test_listing_and_comparison_outputs() {
    let model = retail();
    let listing = compile(&model, &Intent::new().dimension("state"));
    assert_eq!(CostEstimator::new(&model).estimate(&listing.query).output_rows, 50);

    let split = compile(
        &model,
        &Intent::new()
            .metric("total_sales")
            .dimension("region")
            .time_range(TimeRange::relative("last_month"))
            .compare_to(TimeRange::relative("last_year")),
    );
    assert_eq!(CostEstimator::new(&model).estimate(&split.query).output_rows, 8);
}

#[test]
fn test_scan_limit_remediation() {
    let model = retail();
    let tight = RoleLimits {
        max_scan_bytes: 1_000_000_000,
        ..RoleLimits::default()
    };

    assert_eq!(
        violations(&model, &Intent::new().metric("total_sales"), tight),
        [(LimitKind::MaxScanBytes, "add a time range".to_string())]
    );
    assert_eq!(
        violations(
            &model,
            &Intent::new()
                .metric("total_sales")
                .time_range(TimeRange::relative("last_quarter")),
            tight
        ),
        [(
            LimitKind::MaxScanBytes,
            "add a filter or use a pre-aggregated table".to_string()
        )]
    );
}

#[test]
fn test_output_limit_remediation() {
    let model = retail();
    let wide = Intent::new()
        .metric("total_sales")
        .dimension("product")
        .dimension("store_name");

    assert_eq!(
        violations(&model, &wide, RoleLimits::default()),
        [(
            LimitKind::MaxOutputRows,
            "add a limit or group by fewer dimensions".to_string()
        )]
    );
    assert!(violations(&model, &wide.clone().limit(1_000), RoleLimits::default()).is_empty());
    assert_eq!(
        violations(&model, &wide.limit(500_000), RoleLimits::default()),
        [(
            LimitKind::MaxOutputRows,
            "group by fewer or coarser dimensions".to_string()
        )]
    );
}

#[test]
fn test_every_violation_reported() {
    let model = retail();
    let limits = RoleLimits {
        max_output_rows: 10,
        max_scan_bytes: 1_000,
        max_joins: 1,
    };
    let found: Vec<LimitKind> = violations(
        &model,
        &Intent::new().metric("total_sales").dimension("region").dimension("category"),
        limits,
    )
    .into_iter()
    .map(|(kind, _)| kind)
    .collect();
    assert_eq!(
        found,
        [LimitKind::MaxOutputRows, LimitKind::MaxScanBytes, LimitKind::MaxJoins]
    );
}

#[test]
fn test_error_message_lists_violations() {
    let model = retail();
    let compiled = compile(&model, &Intent::new().metric("total_sales"));
    let limits = RoleLimits {
        max_scan_bytes: 1_000,
        ..RoleLimits::default()
    };
    let err = CostEstimator::new(&model)
        .check(&compiled.query, &limits)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "query too expensive: estimated 6000000000 scanned bytes exceeds the limit of 1000 (add a time range)"
    );
}

#[test]
fn test_tiers_from_settings() {
    let settings = Settings::from_toml_str(
        r#"
[cost.tiers.default]
max_scan_bytes = 1000000000

[cost.tiers.analyst]
max_scan_bytes = 100000000000
"#,
    )
    .unwrap();
    let model = retail();
    let intent = Intent::new().metric("total_sales");

    assert_eq!(
        violations(&model, &intent, settings.cost.limits_for("")).len(),
        1
    );
    assert!(violations(&model, &intent, settings.cost.limits_for("analyst")).is_empty());
}
