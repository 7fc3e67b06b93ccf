use chrono::NaiveDate;
use insta::assert_snapshot;
use serde_json::json;
use sqlparser::dialect::{
    DuckDbDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;
use vantage::intent::{Filter, FilterOperator, Intent, SortDirection, TimeRange};
use vantage::model::SemanticModel;
use vantage::planner::{ColumnKind, CompiledQuery, PlanError, QueryBuilder};
use vantage::sql::{Dialect, Literal};
use vantage::time::TimeResolver;
use vantage::validation::{RequiredTables, ResolvedIntent, UserContext, Validator};

const RETAIL: &str = include_str!("../fixtures/retail.toml");

const DIALECTS: [Dialect; 5] = [
    Dialect::DuckDb,
    Dialect::Postgres,
    Dialect::MySql,
    Dialect::TSql,
    Dialect::Snowflake,
];

fn retail() -> SemanticModel {
    SemanticModel::from_toml_str(RETAIL).unwrap()
}

fn resolve(model: &SemanticModel, intent: &Intent) -> (ResolvedIntent, RequiredTables) {
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
    Validator::with_time_resolver(model, TimeResolver::new(*model.calendar(), today))
        .validate(intent, &UserContext::default())
        .unwrap()
}

fn compile_in(model: &SemanticModel, intent: &Intent, dialect: Dialect) -> CompiledQuery {
    let (resolved, tables) = resolve(model, intent);
    QueryBuilder::new(model)
        .with_dialect(dialect)
        .build(&resolved, &tables)
        .unwrap()
}

fn compile(model: &SemanticModel, intent: &Intent) -> CompiledQuery {
    compile_in(model, intent, Dialect::DuckDb)
}

fn parses(sql: &str, dialect: Dialect) {
    let parser: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
    };
    if let Err(e) = Parser::parse_sql(&*parser, sql) {
        panic!("invalid {} SQL: {}\n{}", dialect, e, sql);
    }
}

fn sales_by_region() -> Intent {
    Intent::new().metric("total_sales").dimension("region")
}

fn report_intent() -> Intent {
    Intent::new()
        .metric("revenue")
        .metric("orders")
        .dimension("area")
        .dimension("category")
        .filter(Filter::new("state", FilterOperator::In, json!(["CA", "NY"])))
        .filter(Filter::new("channel", FilterOperator::Ne, json!("online")))
        .time_range(TimeRange::relative("last_quarter"))
        .sort("revenue", SortDirection::Desc)
        .limit(10)
}

#[test]
fn test_sales_by_region() {
    let compiled = compile(&retail(), &sales_by_region());
    assert_snapshot!(compiled.display_sql, @r#"
    SELECT
      "a"."region" AS "region",
      SUM("f"."sales_amount") AS "total_sales"
    FROM "fact_sales" AS "f"
    INNER JOIN "dim_store" AS "a" ON "f"."store_id" = "a"."store_id"
    GROUP BY "a"."region"
    "#);
    assert_eq!(compiled.sql, compiled.display_sql);
    assert!(compiled.params.is_empty());
    assert_eq!(compiled.column_names(), ["region", "total_sales"]);
}

#[test]
fn test_synonym_compiles_identically() {
    let model = retail();
    let canonical = compile(&model, &sales_by_region());
    let synonym = compile(
        &model,
        &Intent::new().metric("revenue").dimension("area"),
    );
    assert_eq!(canonical.sql, synonym.sql);
    assert_eq!(canonical.cache_key(), synonym.cache_key());
}

#[test]
fn test_in_filter_renders_quoted_list() {
    let compiled = compile(
        &retail(),
        &sales_by_region().filter(Filter::new(
            "state",
            FilterOperator::In,
            json!(["CA", "NY"]),
        )),
    );
    assert_snapshot!(compiled.display_sql, @r#"
    SELECT
      "a"."region" AS "region",
      SUM("f"."sales_amount") AS "total_sales"
    FROM "fact_sales" AS "f"
    INNER JOIN "dim_store" AS "a" ON "f"."store_id" = "a"."store_id"
    WHERE "a"."state" IN ('CA', 'NY')
    GROUP BY "a"."region"
    "#);
    assert!(compiled.sql.contains("\"a\".\"state\" IN ($1, $2)"));
    assert_eq!(
        compiled.params,
        [Literal::String("CA".into()), Literal::String("NY".into())]
    );
}

#[test]
fn test_full_report() {
    let compiled = compile(&retail(), &report_intent());
    assert_snapshot!(compiled.display_sql, @r#"
    SELECT
      "a"."region" AS "region",
      "c"."category_name" AS "category",
      SUM("f"."sales_amount") AS "total_sales",
      COUNT(DISTINCT "f"."order_id") AS "order_count"
    FROM "fact_sales" AS "f"
    INNER JOIN "dim_store" AS "a" ON "f"."store_id" = "a"."store_id"
    LEFT JOIN "dim_product" AS "b" ON "f"."product_id" = "b"."product_id"
    LEFT JOIN "dim_category" AS "c" ON "b"."category_id" = "c"."category_id"
    WHERE "a"."state" IN ('CA', 'NY') AND "f"."channel" <> 'online' AND "f"."sale_date" BETWEEN DATE '2024-01-01' AND DATE '2024-03-31'
    GROUP BY "a"."region", "c"."category_name"
    ORDER BY "total_sales" DESC
    LIMIT 10
    "#);
    assert_eq!(compiled.params.len(), 5);
    assert_eq!(
        compiled.params[3],
        Literal::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    );
}

#[test]
fn test_every_dialect_parses() {
    let model = retail();
    let intents = [
        sales_by_region(),
        report_intent(),
        Intent::new().dimension("state").sort("state", SortDirection::Asc),
        Intent::new()
            .metric("gross_margin")
            .metric("return_count")
            .dimension("customer_segment")
            .filter(Filter::new("store_size", FilterOperator::Between, json!([1000, 5000])))
            .filter(Filter::new("product", FilterOperator::IsNotNull, json!(null)))
            .time_range(TimeRange::relative("last_month"))
            .compare_to(TimeRange::relative("last_year"))
            .limit(100),
        Intent::new()
            .metric("avg_sale")
            .filter(Filter::new("order_ts", FilterOperator::Gte, json!("2024-01-01T09:00:00")))
            .filter(Filter::new("store_name", FilterOperator::Like, json!("%Main%"))),
    ];

    for intent in &intents {
        for dialect in DIALECTS {
            let compiled = compile_in(&model, intent, dialect);
            parses(&compiled.display_sql, dialect);
        }
    }
}

#[test]
fn test_placeholders_per_dialect() {
    let model = retail();
    let intent = sales_by_region().filter(Filter::new(
        "state",
        FilterOperator::In,
        json!(["CA", "NY"]),
    ));
    let expected = [
        (Dialect::DuckDb, "\"a\".\"state\" IN ($1, $2)"),
        (Dialect::Postgres, "\"a\".\"state\" IN ($1, $2)"),
        (Dialect::MySql, "`a`.`state` IN (?, ?)"),
        (Dialect::TSql, "[a].[state] IN (@p1, @p2)"),
        (Dialect::Snowflake, "\"a\".\"state\" IN (?, ?)"),
    ];
    for (dialect, fragment) in expected {
        let compiled = compile_in(&model, &intent, dialect);
        assert!(compiled.sql.contains(fragment), "{}: {}", dialect, compiled.sql);
        assert!(!compiled.sql.contains("'CA'"));
        assert_eq!(compiled.params.len(), 2);
    }
}

#[test]
fn test_tsql_limit_uses_offset_fetch() {
    let compiled = compile_in(&retail(), &sales_by_region().limit(5), Dialect::TSql);
    assert!(compiled
        .display_sql
        .ends_with("ORDER BY (SELECT NULL)\nOFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"));
}

#[test]
fn test_compilation_is_deterministic() {
    let model = retail();
    let first = compile(&model, &report_intent());
    for _ in 0..10 {
        let again = compile(&model, &report_intent());
        assert_eq!(again.sql, first.sql);
        assert_eq!(again.params, first.params);
        assert_eq!(again.cache_key(), first.cache_key());
    }
}

#[test]
fn test_one_join_per_table() {
    let model = retail();
    // region, state and store_size all live on dim_store.
    let compiled = compile(
        &model,
        &Intent::new()
            .metric("total_sales")
            .dimension("region")
            .dimension("state")
            .filter(Filter::new("store_size", FilterOperator::Gt, json!(1000)))
            .filter(Filter::new("store_name", FilterOperator::Ne, json!("Outlet"))),
    );
    assert_eq!(compiled.query.joins.len(), 1);
    assert_eq!(compiled.display_sql.matches("JOIN").count(), 1);
}

#[test]
fn test_metric_brings_in_its_tables() {
    let compiled = compile(&retail(), &Intent::new().metric("margin"));
    assert_eq!(compiled.query.joins.len(), 1);
    assert_eq!(compiled.query.joins[0].table.table, "dim_product");
    assert!(compiled.display_sql.contains("\"a\".\"unit_cost\""));
    assert!(!compiled.display_sql.contains("GROUP BY"));
}

#[test]
fn test_fact_only_query_has_no_joins() {
    let compiled = compile(
        &retail(),
        &Intent::new().metric("units_sold").dimension("channel"),
    );
    assert!(compiled.query.joins.is_empty());
    assert_eq!(compiled.aliases, [("fact_sales".to_string(), "f".to_string())]);
}

#[test]
fn test_comparison_split() {
    let compiled = compile(
        &retail(),
        &Intent::new()
            .metric("total_sales")
            .dimension("region")
            .time_range(TimeRange::relative("last_month"))
            .compare_to(TimeRange::relative("last_year")),
    );

    let kinds: Vec<ColumnKind> = compiled.columns.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        [ColumnKind::Dimension, ColumnKind::Period, ColumnKind::Metric]
    );
    assert!(compiled.display_sql.contains(
        "CASE WHEN \"f\".\"sale_date\" BETWEEN DATE '2024-04-01' AND DATE '2024-04-30' THEN 'current' ELSE 'baseline' END AS \"period\""
    ));
    assert!(compiled.display_sql.contains(
        "OR (\"f\".\"sale_date\" BETWEEN DATE '2023-01-01' AND DATE '2023-12-31')"
    ));
    // Two bounds in the CASE, four in the WHERE.
    assert_eq!(compiled.params.len(), 6);
    assert_eq!(compiled.query.group_by.len(), 2);
}

#[test]
fn test_timestamp_dimension_binds_timestamps() {
    let compiled = compile(
        &retail(),
        &Intent::new()
            .metric("order_count")
            .time_range(TimeRange::relative("yesterday").on("order_ts")),
    );
    assert!(compiled.display_sql.contains(
        "\"f\".\"created_at\" BETWEEN TIMESTAMP '2024-05-14 00:00:00.000000' AND TIMESTAMP '2024-05-14 23:59:59.999999'"
    ));
    assert!(matches!(compiled.params[0], Literal::Timestamp(_)));
}

#[test]
fn test_unreachable_table_is_a_plan_error() {
    let source = format!(
        "{RETAIL}\n[[tables]]\nname = \"dim_weather\"\n\n[[dimensions]]\nname = \"weather\"\ntable = \"dim_weather\"\ncolumn = \"conditions\"\ndata_type = \"string\"\n"
    );
    let model = SemanticModel::from_toml_str(&source).unwrap();
    let (resolved, tables) = resolve(&model, &Intent::new().metric("total_sales").dimension("weather"));
    let err = QueryBuilder::new(&model).build(&resolved, &tables).unwrap_err();
    assert_eq!(
        err,
        PlanError::NoJoinPath {
            table: "dim_weather".into(),
            fact_table: "fact_sales".into()
        }
    );
}

#[test]
fn test_explanation() {
    let compiled = compile(&retail(), &report_intent());
    assert_eq!(
        compiled.explanation,
        "Calculating: total_sales, order_count | Grouped by: region, category | Filters: state IN, channel != | Time period: last_quarter on sale_date | Sorted by: total_sales descending | Limit: 10"
    );
}
