//! In-memory graph store.

use crate::store::{
    Direction, GraphCounts, GraphEdge, GraphNode, GraphResult, GraphStore, NodeKey, Properties,
};
use ::async_trait::async_trait;
use quiver_core::{EdgeKind, GraphError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

type EdgeId = (EdgeKind, NodeKey, NodeKey);

#[derive(Debug, Default)]
struct GraphData {
    nodes: BTreeMap<NodeKey, Properties>,
    edges: BTreeMap<EdgeId, Properties>,
}

impl GraphData {
    fn touches(id: &EdgeId, kind: EdgeKind, node: &NodeKey, direction: Direction) -> bool {
        id.0 == kind
            && match direction {
                Direction::Outgoing => id.1 == *node,
                Direction::Incoming => id.2 == *node,
                Direction::Both => id.1 == *node || id.2 == *node,
            }
    }
}

/// Graph held in process memory.
///
/// `set_unavailable` and `fail_next` inject failures so callers' handling of
/// an unreachable or erroring graph can be exercised.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGraph {
    data: Arc<RwLock<GraphData>>,
    unavailable: Arc<AtomicBool>,
    injected: Arc<Mutex<Option<GraphError>>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `GraphError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next operation with `error`.
    pub fn fail_next(&self, error: GraphError) {
        if let Ok(mut slot) = self.injected.lock() {
            *slot = Some(error);
        }
    }

    fn check(&self) -> GraphResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GraphError::Unavailable {
                reason: "in-memory graph marked unavailable".to_string(),
            });
        }
        let injected = self
            .injected
            .lock()
            .map_err(|_| GraphError::LockPoisoned)?
            .take();
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn read(&self) -> GraphResult<RwLockReadGuard<'_, GraphData>> {
        self.check()?;
        self.data.read().map_err(|_| GraphError::LockPoisoned)
    }

    fn write(&self) -> GraphResult<RwLockWriteGuard<'_, GraphData>> {
        self.check()?;
        self.data.write().map_err(|_| GraphError::LockPoisoned)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn merge_node(&self, node: &GraphNode) -> GraphResult<()> {
        let mut data = self.write()?;
        let props = data.nodes.entry(node.key.clone()).or_default();
        for (k, v) in &node.properties {
            props.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn merge_edge(&self, edge: &GraphEdge) -> GraphResult<bool> {
        let mut data = self.write()?;
        if !data.nodes.contains_key(&edge.source) || !data.nodes.contains_key(&edge.target) {
            return Ok(false);
        }
        let props = data
            .edges
            .entry((edge.kind, edge.source.clone(), edge.target.clone()))
            .or_default();
        for (k, v) in &edge.properties {
            props.insert(k.clone(), v.clone());
        }
        Ok(true)
    }

    async fn set_node_properties(
        &self,
        key: &NodeKey,
        properties: &Properties,
    ) -> GraphResult<bool> {
        let mut data = self.write()?;
        let Some(props) = data.nodes.get_mut(key) else {
            return Ok(false);
        };
        for (k, v) in properties {
            props.insert(k.clone(), v.clone());
        }
        Ok(true)
    }

    async fn delete_edge(
        &self,
        kind: EdgeKind,
        source: &NodeKey,
        target: &NodeKey,
    ) -> GraphResult<usize> {
        let mut data = self.write()?;
        let removed = data
            .edges
            .remove(&(kind, source.clone(), target.clone()))
            .is_some();
        Ok(usize::from(removed))
    }

    async fn delete_edges(
        &self,
        kind: EdgeKind,
        node: &NodeKey,
        direction: Direction,
    ) -> GraphResult<usize> {
        let mut data = self.write()?;
        let before = data.edges.len();
        data.edges
            .retain(|id, _| !GraphData::touches(id, kind, node, direction));
        Ok(before - data.edges.len())
    }

    async fn delete_node(&self, key: &NodeKey) -> GraphResult<bool> {
        let mut data = self.write()?;
        if data.nodes.remove(key).is_none() {
            return Ok(false);
        }
        data.edges.retain(|(_, s, t), _| s != key && t != key);
        Ok(true)
    }

    async fn node(&self, key: &NodeKey) -> GraphResult<Option<GraphNode>> {
        let data = self.read()?;
        Ok(data.nodes.get(key).map(|props| GraphNode {
            key: key.clone(),
            properties: props.clone(),
        }))
    }

    async fn neighbors(
        &self,
        kind: EdgeKind,
        node: &NodeKey,
        direction: Direction,
    ) -> GraphResult<Vec<GraphNode>> {
        let data = self.read()?;
        let mut out: Vec<GraphNode> = data
            .edges
            .keys()
            .filter(|id| GraphData::touches(id, kind, node, direction))
            .map(|(_, s, t)| if s == node { t } else { s })
            .filter_map(|k| {
                data.nodes.get(k).map(|props| GraphNode {
                    key: k.clone(),
                    properties: props.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out.dedup_by(|a, b| a.key == b.key);
        Ok(out)
    }

    async fn edges_among(
        &self,
        kind: EdgeKind,
        tenant: &str,
        names: &[String],
    ) -> GraphResult<Vec<GraphEdge>> {
        let data = self.read()?;
        Ok(data
            .edges
            .iter()
            .filter(|((k, s, t), _)| {
                *k == kind
                    && s.tenant == tenant
                    && t.tenant == tenant
                    && names.contains(&s.name)
                    && names.contains(&t.name)
            })
            .map(|((k, s, t), props)| GraphEdge {
                kind: *k,
                source: s.clone(),
                target: t.clone(),
                properties: props.clone(),
            })
            .collect())
    }

    async fn counts(&self, tenant: Option<&str>) -> GraphResult<GraphCounts> {
        let data = self.read()?;
        let in_scope = |k: &NodeKey| tenant.map_or(true, |t| k.tenant == t);
        Ok(GraphCounts {
            nodes: data.nodes.keys().filter(|k| in_scope(k)).count(),
            edges: data.edges.keys().filter(|(_, s, _)| in_scope(s)).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::NodeLabel;

    fn tool(name: &str) -> GraphNode {
        GraphNode {
            key: NodeKey::new(NodeLabel::Tool, name, "acme"),
            properties: Properties::new(),
        }
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let graph = InMemoryGraph::new();
        graph.merge_node(&tool("a")).await.unwrap();
        graph.merge_node(&tool("a")).await.unwrap();
        graph.merge_node(&tool("b")).await.unwrap();
        let edge = GraphEdge::between(EdgeKind::NextTool, "acme", "a", "b");
        assert!(graph.merge_edge(&edge).await.unwrap());
        assert!(graph.merge_edge(&edge).await.unwrap());
        assert_eq!(
            graph.counts(Some("acme")).await.unwrap(),
            GraphCounts { nodes: 2, edges: 1 }
        );
    }

    #[tokio::test]
    async fn test_edge_to_missing_endpoint_is_not_created() {
        let graph = InMemoryGraph::new();
        graph.merge_node(&tool("a")).await.unwrap();
        let edge = GraphEdge::between(EdgeKind::NextTool, "acme", "a", "ghost");
        assert!(!graph.merge_edge(&edge).await.unwrap());
        assert_eq!(graph.counts(None).await.unwrap().edges, 0);
    }

    #[tokio::test]
    async fn test_delete_node_detaches() {
        let graph = InMemoryGraph::new();
        graph.merge_node(&tool("a")).await.unwrap();
        graph.merge_node(&tool("b")).await.unwrap();
        graph
            .merge_edge(&GraphEdge::between(EdgeKind::NextTool, "acme", "a", "b"))
            .await
            .unwrap();
        assert!(graph.delete_node(&tool("a").key).await.unwrap());
        assert_eq!(graph.counts(None).await.unwrap(), GraphCounts { nodes: 1, edges: 0 });
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let graph = InMemoryGraph::new();
        graph.set_unavailable(true);
        assert!(matches!(
            graph.merge_node(&tool("a")).await,
            Err(GraphError::Unavailable { .. })
        ));
        graph.set_unavailable(false);

        graph.fail_next(GraphError::InvalidResponse {
            reason: "bad".to_string(),
        });
        assert!(graph.merge_node(&tool("a")).await.is_err());
        assert!(graph.merge_node(&tool("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_neighbors_ordered_by_name() {
        let graph = InMemoryGraph::new();
        let cap = GraphNode {
            key: NodeKey::new(NodeLabel::Capability, "billing", "acme"),
            properties: Properties::new(),
        };
        graph.merge_node(&cap).await.unwrap();
        for name in ["c", "a", "b"] {
            graph.merge_node(&tool(name)).await.unwrap();
            graph
                .merge_edge(&GraphEdge::between(EdgeKind::HasTool, "acme", "billing", name))
                .await
                .unwrap();
        }
        let names: Vec<String> = graph
            .neighbors(EdgeKind::HasTool, &cap.key, Direction::Outgoing)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.key.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
