//! TOML model loader.
//!
//! A model file is deserialized into a [`ModelDocument`] and then validated
//! into a [`SemanticModel`]. Validation covers everything a query could later
//! trip over:
//!
//! - identifier shape of tables and columns
//! - unique canonical names and non-colliding synonyms
//! - registered tables for dimensions, metrics and relationships
//! - metric expressions parse and only reference declared tables
//! - relationships form a forest (no duplicate pairs, no second path)
//! - default and security dimensions exist
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage::model::SemanticModel;
//!
//! let model = SemanticModel::from_file("model.toml")?;
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::calendar::CalendarConfig;
use super::dimension::Dimension;
use super::error::{ModelError, ModelResult};
use super::expr_parser::parse_metric_expr;
use super::metric::Metric;
use super::relationship::{JoinGraph, Relationship};
use super::types::{Aggregation, DataType, DisplayFormat, TableInfo};
use super::{RowSecurityRule, SemanticModel};
use crate::planner::PERIOD_COLUMN;

/// Pattern for physical table and column names.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Raw model definition as written in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDocument {
    pub fact_table: String,
    #[serde(default)]
    pub default_drill_dimension: Option<String>,
    #[serde(default)]
    pub default_time_dimension: Option<String>,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub dimensions: Vec<DimensionDef>,
    #[serde(default)]
    pub metrics: Vec<MetricDef>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub row_security: Vec<RowSecurityRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionDef {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub table: String,
    pub column: String,
    pub data_type: DataType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub hierarchy: Option<String>,
    #[serde(default)]
    pub approx_distinct: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDef {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    pub aggregation: Aggregation,
    #[serde(default = "default_metric_type")]
    pub data_type: DataType,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub format: DisplayFormat,
}

fn default_metric_type() -> DataType {
    DataType::Decimal
}

/// `total_sales` → `Total Sales`.
fn display_name(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_identifier(kind: &'static str, name: &str) -> ModelResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ModelError::InvalidIdentifier {
            kind,
            name: name.into(),
        })
    }
}

/// Canonical names become output column aliases next to `period`.
fn check_output_name(kind: &'static str, name: &str) -> ModelResult<()> {
    if name.eq_ignore_ascii_case(PERIOD_COLUMN) {
        return Err(ModelError::ReservedName {
            kind,
            name: name.into(),
        });
    }
    Ok(())
}

/// Canonical names and synonyms share one namespace per kind.
#[derive(Default)]
struct NameIndex {
    names: HashMap<String, usize>,
    synonyms: HashMap<String, usize>,
}

impl NameIndex {
    fn add_name(&mut self, kind: &'static str, name: &str, idx: usize) -> ModelResult<()> {
        if self.names.insert(name.to_lowercase(), idx).is_some() {
            return Err(ModelError::DuplicateName {
                kind,
                name: name.into(),
            });
        }
        Ok(())
    }

    fn add_synonyms<'a>(
        &mut self,
        kind: &'static str,
        owners: impl Iterator<Item = (&'a str, &'a [String])>,
        names: &[&str],
    ) -> ModelResult<()> {
        for (idx, (owner, synonyms)) in owners.enumerate() {
            for synonym in synonyms {
                let key = synonym.trim().to_lowercase();
                let other = self
                    .names
                    .get(&key)
                    .or_else(|| self.synonyms.get(&key))
                    .copied();
                match other {
                    Some(o) if o == idx => continue,
                    Some(o) => {
                        return Err(ModelError::SynonymCollision {
                            kind,
                            synonym: synonym.clone(),
                            owner: owner.into(),
                            other: names[o].into(),
                        })
                    }
                    None => {
                        self.synonyms.insert(key, idx);
                    }
                }
            }
        }
        Ok(())
    }
}

impl ModelDocument {
    /// Validate the document and build the immutable registry.
    pub fn into_model(self) -> ModelResult<SemanticModel> {
        self.calendar.validate()?;

        // Tables
        let mut table_names: Vec<&str> = Vec::new();
        for table in &self.tables {
            check_identifier("table", &table.name)?;
            if let Some(schema) = &table.schema {
                check_identifier("schema", schema)?;
            }
            if table_names.contains(&table.name.as_str()) {
                return Err(ModelError::DuplicateName {
                    kind: "table",
                    name: table.name.clone(),
                });
            }
            table_names.push(&table.name);
        }
        let require_table = |owner: String, table: &str| -> ModelResult<()> {
            if table_names.contains(&table) {
                Ok(())
            } else {
                Err(ModelError::UnknownTable {
                    owner,
                    table: table.into(),
                })
            }
        };
        require_table("fact_table".into(), &self.fact_table)?;

        // Dimensions
        let mut dim_index = NameIndex::default();
        let mut dimensions = Vec::with_capacity(self.dimensions.len());
        for (i, def) in self.dimensions.iter().enumerate() {
            check_identifier("column", &def.column)?;
            require_table(format!("dimension '{}'", def.name), &def.table)?;
            check_output_name("dimension", &def.name)?;
            dim_index.add_name("dimension", &def.name, i)?;
            dimensions.push(Dimension {
                name: def.name.clone(),
                display_name: def
                    .display_name
                    .clone()
                    .unwrap_or_else(|| display_name(&def.name)),
                table: def.table.clone(),
                column: def.column.clone(),
                data_type: def.data_type,
                description: def.description.clone(),
                synonyms: def.synonyms.clone(),
                hierarchy: def.hierarchy.clone(),
                is_temporal: def.data_type.is_temporal(),
                approx_distinct: def.approx_distinct,
            });
        }
        let dim_names: Vec<&str> = self.dimensions.iter().map(|d| d.name.as_str()).collect();
        dim_index.add_synonyms(
            "dimension",
            self.dimensions
                .iter()
                .map(|d| (d.name.as_str(), d.synonyms.as_slice())),
            &dim_names,
        )?;

        // Metrics
        let mut metric_index = NameIndex::default();
        let mut metrics = Vec::with_capacity(self.metrics.len());
        for (i, def) in self.metrics.iter().enumerate() {
            check_output_name("metric", &def.name)?;
            metric_index.add_name("metric", &def.name, i)?;
            if dim_index.names.contains_key(&def.name.to_lowercase()) {
                return Err(ModelError::MetricDimensionClash {
                    name: def.name.clone(),
                });
            }
            for table in &def.tables {
                require_table(format!("metric '{}'", def.name), table)?;
            }
            let expr =
                parse_metric_expr(&def.expression).map_err(|e| ModelError::InvalidExpression {
                    metric: def.name.clone(),
                    message: e.to_string(),
                })?;
            for table in expr.referenced_tables() {
                if !def.tables.contains(&table) {
                    return Err(ModelError::UndeclaredExpressionTable {
                        metric: def.name.clone(),
                        table,
                    });
                }
            }
            let mut columns_ok = Ok(());
            expr.walk(&mut |e| {
                if let crate::sql::Expr::Column { column, .. } = e {
                    if columns_ok.is_ok() {
                        columns_ok = check_identifier("column", column);
                    }
                }
            });
            columns_ok?;

            metrics.push(Metric {
                name: def.name.clone(),
                display_name: def
                    .display_name
                    .clone()
                    .unwrap_or_else(|| display_name(&def.name)),
                description: def.description.clone(),
                expression: def.expression.clone(),
                expr,
                aggregation: def.aggregation,
                data_type: def.data_type,
                synonyms: def.synonyms.clone(),
                tables: def.tables.clone(),
                format: def.format,
            });
        }
        let metric_names: Vec<&str> = self.metrics.iter().map(|m| m.name.as_str()).collect();
        metric_index.add_synonyms(
            "metric",
            self.metrics
                .iter()
                .map(|m| (m.name.as_str(), m.synonyms.as_slice())),
            &metric_names,
        )?;

        // Relationships
        for rel in &self.relationships {
            for end in [&rel.from, &rel.to] {
                require_table(format!("relationship {} -> {}", rel.from, rel.to), &end.table)?;
                check_identifier("column", &end.column)?;
            }
        }
        let join_graph = JoinGraph::build(&self.relationships)?;

        let model = SemanticModel {
            fact_table: self.fact_table,
            tables: self.tables,
            dimensions,
            metrics,
            relationships: self.relationships,
            join_graph,
            calendar: self.calendar,
            row_security: self.row_security,
            default_drill_dimension: self.default_drill_dimension,
            default_time_dimension: self.default_time_dimension,
            dimension_names: dim_index.names,
            dimension_synonyms: dim_index.synonyms,
            metric_names: metric_index.names,
            metric_synonyms: metric_index.synonyms,
        };

        model.check_references()?;

        debug!(
            fact_table = %model.fact_table,
            tables = model.tables.len(),
            dimensions = model.dimensions.len(),
            metrics = model.metrics.len(),
            "semantic model loaded"
        );
        Ok(model)
    }
}

impl SemanticModel {
    /// Checks that need the resolution indexes.
    fn check_references(&self) -> ModelResult<()> {
        if let Some(name) = &self.default_drill_dimension {
            self.resolve_dimension(name)
                .ok_or_else(|| ModelError::UnknownDimension {
                    context: "default_drill_dimension",
                    name: name.clone(),
                })?;
        }

        if let Some(name) = &self.default_time_dimension {
            let dim = self
                .resolve_dimension(name)
                .ok_or_else(|| ModelError::UnknownDimension {
                    context: "default_time_dimension",
                    name: name.clone(),
                })?;
            if !dim.is_temporal {
                return Err(ModelError::NonTemporalDefault { name: name.clone() });
            }
        }

        for rule in &self.row_security {
            self.resolve_dimension(&rule.dimension)
                .ok_or_else(|| ModelError::UnknownDimension {
                    context: "row_security",
                    name: rule.dimension.clone(),
                })?;
        }

        // Unreachable tables are tolerated here; a query that needs one fails
        // with NoJoinPath when it is built.
        let metric_tables = self.metrics.iter().flat_map(|m| m.tables.iter());
        let dim_tables = self.dimensions.iter().map(|d| &d.table);
        let mut warned: Vec<&str> = Vec::new();
        for table in dim_tables.chain(metric_tables) {
            if table == &self.fact_table || warned.contains(&table.as_str()) {
                continue;
            }
            if self.join_path(table).is_none() {
                warn!(table = %table, fact_table = %self.fact_table, "table is not joined to the fact table");
                warned.push(table);
            }
        }

        Ok(())
    }
}
