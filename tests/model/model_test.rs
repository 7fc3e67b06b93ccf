use vantage::model::{Aggregation, DataType, DisplayFormat, ModelError, SemanticModel};

const RETAIL: &str = include_str!("../fixtures/retail.toml");

fn retail() -> SemanticModel {
    SemanticModel::from_toml_str(RETAIL).unwrap()
}

#[test]
fn test_fixture_loads() {
    let model = retail();
    assert_eq!(model.fact_table(), "fact_sales");
    assert_eq!(model.tables().len(), 5);
    assert_eq!(model.relationships().len(), 4);
    assert_eq!(model.default_drill_dimension().unwrap().name, "region");
    assert_eq!(model.default_time_dimension().unwrap().name, "sale_date");
}

#[test]
fn test_synonyms_resolve_to_canonical_names() {
    let model = retail();
    for token in ["region", "area", "Territory", "  AREA "] {
        assert_eq!(model.resolve_dimension(token).unwrap().name, "region", "{token}");
    }
    assert_eq!(model.resolve_dimension("product category").unwrap().name, "category");
    assert_eq!(model.resolve_metric("revenue").unwrap().name, "total_sales");
    assert!(model.resolve_metric("bogus_metric").is_none());
    assert!(model.resolve_dimension("revenue").is_none());
}

#[test]
fn test_metric_definitions() {
    let model = retail();
    let orders = model.resolve_metric("orders").unwrap();
    assert_eq!(orders.aggregation, Aggregation::CountDistinct);
    assert_eq!(orders.data_type, DataType::Integer);

    let margin = model.resolve_metric("margin").unwrap();
    assert_eq!(margin.tables, ["fact_sales", "dim_product"]);
    assert_eq!(margin.format, DisplayFormat::Currency);
}

#[test]
fn test_temporal_flag_follows_data_type() {
    let model = retail();
    assert!(model.resolve_dimension("sale_date").unwrap().is_temporal);
    assert!(model.resolve_dimension("order_ts").unwrap().is_temporal);
    assert!(!model.resolve_dimension("sale_month").unwrap().is_temporal);
}

#[test]
fn test_dimension_for_column() {
    let model = retail();
    let dim = model.dimension_for_column("dim_store", "square_feet").unwrap();
    assert_eq!(dim.name, "store_size");
    assert!(model.dimension_for_column("dim_store", "store_id").is_none());
}

#[test]
fn test_snowflake_join_path() {
    let model = retail();
    let path = model.join_path("dim_category").unwrap();
    let hops: Vec<(&str, &str, bool)> = path
        .iter()
        .map(|s| (s.parent.as_str(), s.child.as_str(), s.reversed))
        .collect();
    assert_eq!(
        hops,
        [
            ("fact_sales", "dim_product", false),
            ("dim_product", "dim_category", true)
        ]
    );
    assert!(model.join_path("fact_sales").unwrap().is_empty());
}

#[test]
fn test_duplicate_relationship_rejected() {
    let source = format!(
        "{RETAIL}\n[[relationships]]\nfrom = \"dim_store.store_id\"\nto = \"fact_sales.store_id\"\ncardinality = \"one_to_many\"\n"
    );
    let err = SemanticModel::from_toml_str(&source).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateRelationship { .. }), "{err}");
}

#[test]
fn test_second_path_rejected() {
    let source = format!(
        "{RETAIL}\n[[relationships]]\nfrom = \"dim_customer.home_store_id\"\nto = \"dim_store.store_id\"\ncardinality = \"many_to_one\"\n"
    );
    let err = SemanticModel::from_toml_str(&source).unwrap_err();
    assert!(matches!(err, ModelError::AmbiguousJoinPath { .. }), "{err}");
}

#[test]
fn test_synonym_collision_rejected() {
    let source = RETAIL.replace(
        "synonyms = [\"store\", \"location\"]",
        "synonyms = [\"store\", \"area\"]",
    );
    let err = SemanticModel::from_toml_str(&source).unwrap_err();
    assert!(matches!(err, ModelError::SynonymCollision { .. }), "{err}");
}

#[test]
fn test_unregistered_dimension_table_rejected() {
    let source = RETAIL.replace("table = \"dim_customer\"", "table = \"dim_shopper\"");
    let err = SemanticModel::from_toml_str(&source).unwrap_err();
    assert!(matches!(err, ModelError::UnknownTable { .. }), "{err}");
}

#[test]
fn test_missing_file() {
    let err = SemanticModel::from_file("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, ModelError::Io { .. }));
}

#[test]
fn test_catalog_lists_everything() {
    let model = retail();
    let catalog = model.catalog();
    assert_eq!(catalog.metrics.len(), 7);
    assert_eq!(catalog.dimensions.len(), 11);

    let sales = catalog.metrics.iter().find(|m| m.name == "total_sales").unwrap();
    assert_eq!(sales.source, "SUM(fact_sales.sales_amount)");
    let region = catalog.dimensions.iter().find(|d| d.name == "region").unwrap();
    assert_eq!(region.source, "dim_store.region");
}

#[test]
fn test_keyword_search() {
    let model = retail();
    let hits = model.search(&["REVENUE"]);
    let names: Vec<_> = hits.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["total_sales"]);
    assert!(hits.dimensions.is_empty());

    let hits = model.search(&["store"]);
    let names: Vec<_> = hits.dimensions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["region", "state", "store_name", "store_size", "channel"]);

    assert!(model.search(&["  "]).is_empty());
}
