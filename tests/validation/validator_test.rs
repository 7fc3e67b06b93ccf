use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use vantage::intent::{Filter, FilterOperator, Intent, SortDirection, TimeRange};
use vantage::model::SemanticModel;
use vantage::sql::Literal;
use vantage::time::{TimeRangeError, TimeResolver};
use vantage::validation::{UserContext, ValidationError, Validator};

const RETAIL: &str = include_str!("../fixtures/retail.toml");

fn retail() -> SemanticModel {
    SemanticModel::from_toml_str(RETAIL).unwrap()
}

fn validator(model: &SemanticModel) -> Validator<'_> {
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
    Validator::with_time_resolver(model, TimeResolver::new(*model.calendar(), today))
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
}

#[test]
fn test_synonyms_resolve() {
    let model = retail();
    let intent = Intent::new()
        .metric("revenue")
        .dimension("area")
        .dimension("territory");
    let (resolved, tables) = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap();

    assert_eq!(resolved.metrics, ["total_sales"]);
    assert_eq!(resolved.dimensions, ["region"]);
    assert_eq!(tables.as_slice(), ["fact_sales", "dim_store"]);
}

#[test]
fn test_unknown_metric_names_the_token() {
    let model = retail();
    let err = validator(&model)
        .validate(
            &Intent::new().metric("bogus_metric"),
            &UserContext::default(),
        )
        .unwrap_err();
    assert_eq!(err, ValidationError::UnknownMetric("bogus_metric".into()));
    assert!(err.to_string().contains("bogus_metric"));
}

#[test]
fn test_filter_values_coerced() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .filter(Filter::new("state", FilterOperator::In, json!(["CA", "NY"])))
        .filter(Filter::new("store_size", FilterOperator::Gte, json!("2500")));
    let (resolved, _) = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap();

    assert_eq!(
        resolved.filters[0].values,
        [Literal::String("CA".into()), Literal::String("NY".into())]
    );
    assert_eq!(resolved.filters[1].values, [Literal::Int(2500)]);
}

#[test]
fn test_bad_filter_value() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .filter(Filter::new("store_size", FilterOperator::Eq, json!("large")));
    let err = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InvalidFilterValue { ref dimension, .. } if dimension == "store_size"
    ));
}

#[test]
fn test_like_on_numeric_dimension_rejected() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .filter(Filter::new("store_size", FilterOperator::Like, json!("25%")));
    assert!(validator(&model)
        .validate(&intent, &UserContext::default())
        .is_err());
}

#[test]
fn test_time_range_defaults_to_model_dimension() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .time_range(TimeRange::relative("last_quarter"));
    let (resolved, _) = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap();

    let range = resolved.time_range.unwrap();
    assert_eq!(range.dimension, "sale_date");
    assert_eq!(range.start, at("2024-01-01 00:00:00.0"));
    assert_eq!(range.end, at("2024-03-31 23:59:59.999999"));
    assert_eq!(range.relative.as_deref(), Some("last_quarter"));
}

#[test]
fn test_time_range_on_non_temporal_dimension() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .time_range(TimeRange::relative("last_month").on("region"));
    let err = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap_err();
    assert_eq!(err, ValidationError::NonTemporalDimension("region".into()));
}

#[test]
fn test_unsupported_relative_expression() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .time_range(TimeRange::relative("next_fortnight"));
    let err = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::TimeRange(TimeRangeError::UnsupportedRelativeExpression(_))
    ));
}

#[test]
fn test_sort_must_name_an_output() {
    let model = retail();
    let intent = Intent::new()
        .metric("total_sales")
        .dimension("region")
        .sort("units_sold", SortDirection::Desc);
    let err = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap_err();
    assert_eq!(err, ValidationError::InvalidSortField("units_sold".into()));
}

#[test]
fn test_diagnostic_gets_previous_period() {
    let model = retail();
    let intent = Intent::new()
        .diagnostic()
        .metric("total_sales")
        .time_range(TimeRange::relative("last_month"));
    let (resolved, _) = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap();

    let baseline = resolved.comparison.unwrap();
    assert_eq!(baseline.dimension, "sale_date");
    assert_eq!(baseline.start, at("2024-03-01 00:00:00.0"));
    assert_eq!(baseline.end, at("2024-03-31 23:59:59.999999"));
}

#[test]
fn test_diagnostic_requires_time_range() {
    let model = retail();
    let intent = Intent::new().diagnostic().metric("total_sales");
    let err = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap_err();
    assert_eq!(err, ValidationError::DiagnosticWithoutTimeRange);
}

#[test]
fn test_validation_is_idempotent() {
    let model = retail();
    let v = validator(&model);
    let user = UserContext::default();
    let intents = [
        Intent::new()
            .metric("revenue")
            .dimension("area")
            .filter(Filter::new("state", FilterOperator::In, json!(["CA", "NY"])))
            .time_range(TimeRange::relative("last_quarter"))
            .sort("revenue", SortDirection::Desc)
            .limit(10),
        Intent::new()
            .metric("orders")
            .filter(Filter::new("order_ts", FilterOperator::Gte, json!("2024-01-01")))
            .time_range(TimeRange::between("2024-03-01", "2024-03-31").on("order_ts"))
            .compare_to(TimeRange::relative("last_year")),
        Intent::new()
            .diagnostic()
            .metric("total_sales")
            .time_range(TimeRange::relative("last_month")),
        Intent::new().dimension("category"),
    ];

    for intent in intents {
        let (first, _) = v.validate(&intent, &user).unwrap();
        let (second, _) = v.validate(&first.to_intent(), &user).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_intent_from_json() {
    let model = retail();
    let intent = Intent::from_json(
        r#"{
            "metrics": ["revenue"],
            "dimensions": ["area"],
            "filters": [{"dimension": "state", "operator": "in", "value": ["CA"]}],
            "time_range": {"relative": "last_month"},
            "sort": [{"field": "revenue", "direction": "desc"}],
            "limit": 5
        }"#,
    )
    .unwrap();
    let (resolved, _) = validator(&model)
        .validate(&intent, &UserContext::default())
        .unwrap();
    assert_eq!(resolved.sort[0].field, "total_sales");
    assert_eq!(resolved.limit, Some(5));
}

#[test]
fn test_unknown_intent_field_rejected() {
    assert!(Intent::from_json(r#"{"metrics": ["revenue"], "groupby": ["area"]}"#).is_err());
}

#[test]
fn test_row_security() {
    let source = format!(
        "{RETAIL}\n[[row_security]]\ndimension = \"region\"\nscope = \"territory\"\n"
    );
    let model = SemanticModel::from_toml_str(&source).unwrap();
    let intent = Intent::new().metric("total_sales");

    let err = validator(&model)
        .validate(&intent, &UserContext::new("u1"))
        .unwrap_err();
    assert_eq!(
        err,
        ValidationError::PermissionDenied {
            scope: "territory".into()
        }
    );

    let user = UserContext::new("u2").with_scope("territory", &["West"]);
    let (resolved, tables) = validator(&model).validate(&intent, &user).unwrap();
    assert_eq!(resolved.security_filters.len(), 1);
    assert_eq!(resolved.security_filters[0].operator, FilterOperator::In);
    assert_eq!(resolved.security_filters[0].values, [Literal::String("West".into())]);
    assert!(tables.contains("dim_store"));
}

fn with_discount() -> SemanticModel {
    let source = format!(
        "{RETAIL}\n[[dimensions]]\nname = \"discount\"\ntable = \"fact_sales\"\ncolumn = \"discount_rate\"\ndata_type = \"decimal\"\n"
    );
    SemanticModel::from_toml_str(&source).unwrap()
}

#[test]
fn test_non_finite_filter_values_rejected() {
    let model = with_discount();
    for raw in ["NaN", "inf", "infinity"] {
        let intent = Intent::new()
            .metric("total_sales")
            .filter(Filter::new("discount", FilterOperator::Gt, json!(raw)));
        let err = validator(&model)
            .validate(&intent, &UserContext::default())
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidFilterValue { ref dimension, .. } if dimension == "discount"),
            "{raw}: {err:?}"
        );
    }
}

#[test]
fn test_between_needs_two_bounds() {
    let model = with_discount();
    for bounds in [json!([0.1]), json!([0.1, 0.2, 0.3])] {
        let intent = Intent::new()
            .metric("total_sales")
            .filter(Filter::new("discount", FilterOperator::Between, bounds));
        assert!(matches!(
            validator(&model).validate(&intent, &UserContext::default()),
            Err(ValidationError::InvalidFilterValue { .. })
        ));
    }
}

#[test]
fn test_diagnostic_needs_additive_metric() {
    let model = retail();
    for metric in ["avg_sale", "active_customers"] {
        let intent = Intent::new()
            .diagnostic()
            .metric(metric)
            .time_range(TimeRange::relative("last_month"));
        let err = validator(&model)
            .validate(&intent, &UserContext::default())
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::NonAdditiveDiagnostic { metric: ref m, .. } if m == metric),
            "{err:?}"
        );
    }

    let summed = Intent::new()
        .diagnostic()
        .metric("units_sold")
        .time_range(TimeRange::relative("last_month"));
    assert!(validator(&model)
        .validate(&summed, &UserContext::default())
        .is_ok());
}
