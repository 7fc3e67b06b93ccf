//! Relationships between tables and the join graph built from them.
//!
//! The graph is undirected: a relationship can be walked from either end.
//! Model construction guarantees it is a forest, so every reachable table
//! has exactly one path back to the fact table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::types::{Cardinality, JoinKind};

/// A `table.column` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl FromStr for ColumnRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((table, column))
                if !table.is_empty() && !column.is_empty() && !column.contains('.') =>
            {
                Ok(ColumnRef::new(table, column))
            }
            _ => Err(ModelError::InvalidColumnRef(s.into())),
        }
    }
}

impl TryFrom<String> for ColumnRef {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ColumnRef> for String {
    fn from(c: ColumnRef) -> Self {
        c.to_string()
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A declared join between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: ColumnRef,
    pub to: ColumnRef,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub join: JoinKind,
}

/// One hop of a join path, oriented away from the root table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Table already in the query.
    pub parent: String,
    /// Table being joined.
    pub child: String,
    /// Index into the model's relationship list.
    pub relationship: usize,
    /// True when the relationship is declared child → parent.
    pub reversed: bool,
}

/// Undirected table graph over the declared relationships.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    graph: UnGraph<String, usize>,
    nodes: HashMap<String, NodeIndex>,
}

struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

impl JoinGraph {
    /// Build the graph, rejecting duplicate table pairs and cycles.
    ///
    /// A cycle means some table can be reached along two different paths,
    /// which would make the join plan ambiguous.
    pub fn build(relationships: &[Relationship]) -> Result<Self, ModelError> {
        let mut graph = UnGraph::<String, usize>::new_undirected();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut pairs: HashSet<(String, String)> = HashSet::new();

        for rel in relationships {
            for table in [&rel.from.table, &rel.to.table] {
                if !nodes.contains_key(table) {
                    let idx = graph.add_node(table.clone());
                    nodes.insert(table.clone(), idx);
                }
            }
        }

        let mut components = UnionFind::<usize>::new(graph.node_count());

        for (i, rel) in relationships.iter().enumerate() {
            let (a, b) = (&rel.from.table, &rel.to.table);
            let key = if a <= b {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            if !pairs.insert(key) {
                return Err(ModelError::DuplicateRelationship {
                    left: a.clone(),
                    right: b.clone(),
                });
            }

            let (na, nb) = (nodes[a], nodes[b]);
            if !components.union(na.index(), nb.index()) {
                return Err(ModelError::AmbiguousJoinPath { table: b.clone() });
            }
            graph.add_edge(na, nb, i);
        }

        Ok(Self { graph, nodes })
    }

    /// Whether `table` takes part in any relationship.
    pub fn contains(&self, table: &str) -> bool {
        self.nodes.contains_key(table)
    }

    /// The unique path from `root` to `target`, as hops away from `root`.
    ///
    /// Returns `None` when the tables are not connected. An empty path means
    /// `root == target`.
    pub fn path(
        &self,
        root: &str,
        target: &str,
        relationships: &[Relationship],
    ) -> Option<Vec<JoinStep>> {
        if root == target {
            return Some(Vec::new());
        }
        let root_idx = *self.nodes.get(root)?;
        let target_idx = *self.nodes.get(target)?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        queue.push_back(root_idx);
        visited.insert(root_idx);

        while let Some(current) = queue.pop_front() {
            if current == target_idx {
                break;
            }
            for edge_ref in self.graph.edges(current) {
                let neighbor = if edge_ref.source() == current {
                    edge_ref.target()
                } else {
                    edge_ref.source()
                };
                if !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge_ref.id(),
                    },
                );
                queue.push_back(neighbor);
            }
        }

        if !parents.contains_key(&target_idx) {
            return None;
        }

        let mut steps = Vec::new();
        let mut current = target_idx;
        while current != root_idx {
            let info = &parents[&current];
            let rel_idx = self.graph[info.edge_idx];
            let parent = self.graph[info.parent].clone();
            let child = self.graph[current].clone();
            let reversed = relationships[rel_idx].from.table != parent;
            steps.push(JoinStep {
                parent,
                child,
                relationship: rel_idx,
                reversed,
            });
            current = info.parent;
        }
        steps.reverse();
        Some(steps)
    }
}
