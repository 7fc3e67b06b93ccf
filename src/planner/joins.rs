//! Join planning: expand required tables along their paths to the fact
//! table and render one JOIN per table.

use crate::model::{JoinStep, SemanticModel};
use crate::sql::{table_col, ExprExt, Join, JoinType, TableRef};
use crate::validation::RequiredTables;

use super::aliases::AliasMap;
use super::{PlanError, PlanResult};

/// Tables in join order with the hop that brings each one in.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    /// Fact table first, then every joined table. Intermediate tables of a
    /// snowflake path precede the table that needs them.
    pub tables: Vec<String>,
    pub steps: Vec<JoinStep>,
}

impl JoinPlan {
    pub fn resolve(model: &SemanticModel, required: &RequiredTables) -> PlanResult<Self> {
        let fact = model.fact_table();
        let mut plan = JoinPlan {
            tables: vec![fact.to_string()],
            steps: Vec::new(),
        };

        for table in required.iter().filter(|t| *t != fact) {
            let path = model
                .join_path(table)
                .ok_or_else(|| PlanError::NoJoinPath {
                    table: table.to_string(),
                    fact_table: fact.to_string(),
                })?;
            for step in path {
                if plan.tables.contains(&step.child) {
                    continue;
                }
                plan.tables.push(step.child.clone());
                plan.steps.push(step);
            }
        }
        Ok(plan)
    }

    /// JOIN clauses, oriented from the fact table outwards.
    ///
    /// A step walked against its declared direction swaps the predicate
    /// sides and turns LEFT into RIGHT (and back).
    pub fn to_joins(&self, model: &SemanticModel, aliases: &AliasMap) -> PlanResult<Vec<Join>> {
        self.steps
            .iter()
            .map(|step| {
                let rel = &model.relationships()[step.relationship];
                let (parent_end, child_end) = if step.reversed {
                    (&rel.to, &rel.from)
                } else {
                    (&rel.from, &rel.to)
                };
                let join_type = if step.reversed {
                    JoinType::from(rel.join).reversed()
                } else {
                    JoinType::from(rel.join)
                };

                let parent_alias = alias_of(aliases, &step.parent)?;
                let child_alias = alias_of(aliases, &step.child)?;
                let schema = model.table(&step.child).and_then(|t| t.schema.as_deref());

                Ok(Join {
                    join_type,
                    table: TableRef::new(&step.child)
                        .with_schema(schema)
                        .with_alias(child_alias),
                    on: table_col(parent_alias, &parent_end.column)
                        .eq(table_col(child_alias, &child_end.column)),
                })
            })
            .collect()
    }
}

fn alias_of<'m>(aliases: &'m AliasMap, table: &str) -> PlanResult<&'m str> {
    aliases.get(table).ok_or_else(|| PlanError::MissingTable {
        context: "join".into(),
        table: table.to_string(),
    })
}
