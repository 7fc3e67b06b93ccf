//! Catalog listing and keyword search over the registry.

use serde::Serialize;

use super::{Dimension, Metric, SemanticModel};

/// Listing entry for a metric or dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub synonyms: Vec<String>,
    /// `table.column` for dimensions, the expression for metrics.
    pub source: String,
    pub data_type: String,
}

impl From<&Metric> for CatalogEntry {
    fn from(m: &Metric) -> Self {
        Self {
            name: m.name.clone(),
            display_name: m.display_name.clone(),
            description: m.description.clone(),
            synonyms: m.synonyms.clone(),
            source: format!(
                "{}({})",
                m.aggregation.function_name(),
                m.expression.trim()
            ),
            data_type: m.data_type.to_string(),
        }
    }
}

impl From<&Dimension> for CatalogEntry {
    fn from(d: &Dimension) -> Self {
        Self {
            name: d.name.clone(),
            display_name: d.display_name.clone(),
            description: d.description.clone(),
            synonyms: d.synonyms.clone(),
            source: format!("{}.{}", d.table, d.column),
            data_type: d.data_type.to_string(),
        }
    }
}

/// Everything a caller may ask for.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub metrics: Vec<CatalogEntry>,
    pub dimensions: Vec<CatalogEntry>,
}

/// Keyword search hits, in model declaration order.
#[derive(Debug, Clone, Default)]
pub struct SearchResults<'a> {
    pub metrics: Vec<&'a Metric>,
    pub dimensions: Vec<&'a Dimension>,
}

impl SearchResults<'_> {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.dimensions.is_empty()
    }
}

fn hit(keywords: &[String], name: &str, description: &str, synonyms: &[String]) -> bool {
    keywords.iter().any(|k| {
        name.to_lowercase().contains(k.as_str())
            || description.to_lowercase().contains(k.as_str())
            || synonyms.iter().any(|s| s.to_lowercase().contains(k.as_str()))
    })
}

impl SemanticModel {
    pub fn catalog(&self) -> Catalog {
        Catalog {
            metrics: self.metrics.iter().map(CatalogEntry::from).collect(),
            dimensions: self.dimensions.iter().map(CatalogEntry::from).collect(),
        }
    }

    /// Case-insensitive substring search over names, descriptions and
    /// synonyms. An entry matches when any keyword matches.
    pub fn search<S: AsRef<str>>(&self, keywords: &[S]) -> SearchResults<'_> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return SearchResults::default();
        }

        SearchResults {
            metrics: self
                .metrics
                .iter()
                .filter(|m| hit(&keywords, &m.name, &m.description, &m.synonyms))
                .collect(),
            dimensions: self
                .dimensions
                .iter()
                .filter(|d| hit(&keywords, &d.name, &d.description, &d.synonyms))
                .collect(),
        }
    }
}
