//! Row-level security.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{coerce, RequiredTables, ResolvedFilter, ResolvedIntent, ValidationError, ValidationResult};
use crate::intent::FilterOperator;
use crate::model::SemanticModel;

/// Caller identity supplied by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserContext {
    pub user_id: String,
    /// Authorized values per scope name, e.g. `territory -> [West, East]`.
    pub scopes: BTreeMap<String, Vec<String>>,
    /// Cost-limit tier; empty means the default tier.
    pub cost_tier: String,
}

impl UserContext {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: &str, values: &[&str]) -> Self {
        self.scopes.insert(
            scope.into(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_cost_tier(mut self, tier: &str) -> Self {
        self.cost_tier = tier.into();
        self
    }
}

/// Append one IN filter per model rule. A rule whose scope the caller does
/// not carry, or carries empty, denies the whole request.
pub(super) fn apply(
    model: &SemanticModel,
    user: &UserContext,
    resolved: &mut ResolvedIntent,
    tables: &mut RequiredTables,
) -> ValidationResult<()> {
    for rule in model.row_security() {
        let values = match user.scopes.get(&rule.scope) {
            Some(values) if !values.is_empty() => values,
            _ => {
                return Err(ValidationError::PermissionDenied {
                    scope: rule.scope.clone(),
                })
            }
        };

        let dim = model
            .resolve_dimension(&rule.dimension)
            .ok_or_else(|| ValidationError::UnknownDimension(rule.dimension.clone()))?;
        let raw = Value::Array(values.iter().map(|v| Value::from(v.as_str())).collect());

        tables.add(&dim.table);
        resolved.security_filters.push(ResolvedFilter {
            dimension: dim.name.clone(),
            operator: FilterOperator::In,
            values: coerce::filter_values(dim, FilterOperator::In, &raw)?,
        });
    }
    Ok(())
}
