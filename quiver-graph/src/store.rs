//! Graph store trait and record types

use ::async_trait::async_trait;
use quiver_core::{EdgeKind, GraphError, NodeLabel};
use serde::{Deserialize, Serialize};

/// Property map of a node or relationship.
pub type Properties = serde_json::Map<String, serde_json::Value>;

pub type GraphResult<T> = Result<T, GraphError>;

/// Identity of a graph node: label plus the (name, tenant_name) composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub name: String,
    pub tenant: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, name: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            label,
            name: name.into(),
            tenant: tenant.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub key: NodeKey,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub source: NodeKey,
    pub target: NodeKey,
    pub properties: Properties,
}

impl GraphEdge {
    /// Edge between two nodes of the same tenant, labels taken from the kind.
    pub fn between(
        kind: EdgeKind,
        tenant: &str,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let (source_label, target_label) = kind.endpoints();
        Self {
            kind,
            source: NodeKey::new(source_label, source, tenant),
            target: NodeKey::new(target_label, target, tenant),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Which relationships of a node an operation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Node and relationship totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
}

/// Typed MERGE/MATCH operations over the property graph.
///
/// Writes are idempotent. Edges are never created to a missing endpoint:
/// `merge_edge` reports `false` instead.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create the node or overwrite the given properties on it.
    async fn merge_node(&self, node: &GraphNode) -> GraphResult<()>;

    /// Create or update the relationship. `false` when an endpoint is missing.
    async fn merge_edge(&self, edge: &GraphEdge) -> GraphResult<bool>;

    /// Set properties on an existing node. `false` when the node is missing.
    async fn set_node_properties(&self, key: &NodeKey, properties: &Properties)
        -> GraphResult<bool>;

    /// Delete one relationship. Returns how many were removed.
    async fn delete_edge(&self, kind: EdgeKind, source: &NodeKey, target: &NodeKey)
        -> GraphResult<usize>;

    /// Delete every relationship of `kind` touching `node` in `direction`.
    async fn delete_edges(&self, kind: EdgeKind, node: &NodeKey, direction: Direction)
        -> GraphResult<usize>;

    /// Delete a node together with all its relationships.
    async fn delete_node(&self, key: &NodeKey) -> GraphResult<bool>;

    async fn node(&self, key: &NodeKey) -> GraphResult<Option<GraphNode>>;

    /// Nodes across relationships of `kind`, ordered by name.
    async fn neighbors(&self, kind: EdgeKind, node: &NodeKey, direction: Direction)
        -> GraphResult<Vec<GraphNode>>;

    /// Relationships of `kind` whose both endpoints are among `names`.
    async fn edges_among(&self, kind: EdgeKind, tenant: &str, names: &[String])
        -> GraphResult<Vec<GraphEdge>>;

    /// Totals, for one tenant or the whole graph.
    async fn counts(&self, tenant: Option<&str>) -> GraphResult<GraphCounts>;
}
