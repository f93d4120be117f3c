//! Best-effort mirror of relational writes into the graph.
//!
//! Writes never undo a committed relational change. Connection failures and
//! graph-side query errors are logged as warnings and swallowed. Anything
//! else (malformed responses, invalid input) is logged as an error and, in
//! strict mode, returned to the caller. Read checks propagate every error.

use crate::paths::candidate_paths;
use crate::project;
use crate::store::{Direction, GraphEdge, GraphNode, GraphResult, GraphStore, Properties};
use quiver_core::{
    CandidatePath, Capability, Domain, EdgeKind, NodeLabel, QuiverError, QuiverResult, Skill,
    Tool, ToolSkill, Workflow,
};
use serde_json::Value;
use std::sync::Arc;

const ANALYZED: &str = "analyzed";

#[derive(Clone)]
pub struct GraphMirror {
    graph: Arc<dyn GraphStore>,
    strict: bool,
}

impl GraphMirror {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            strict: false,
        }
    }

    /// Return non-recoverable graph errors instead of only logging them.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    /// Apply the write-path error policy to a graph result.
    pub(crate) fn absorb<T>(&self, op: &str, result: GraphResult<T>) -> QuiverResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(op = op, error = %e, "Graph write skipped");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(op = op, error = %e, strict = self.strict, "Graph write failed");
                if self.strict {
                    Err(QuiverError::Graph(e))
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn merge_node(&self, op: &str, node: GraphNode) -> QuiverResult<()> {
        let result = self.graph.merge_node(&node).await;
        self.absorb(op, result)?;
        Ok(())
    }

    /// `true` when the edge exists afterwards.
    async fn merge_edge(&self, op: &str, edge: GraphEdge) -> QuiverResult<bool> {
        let result = self.graph.merge_edge(&edge).await;
        match self.absorb(op, result)? {
            Some(true) => Ok(true),
            Some(false) => {
                tracing::warn!(
                    op = op,
                    tenant = %edge.source.tenant,
                    source = %edge.source.name,
                    target = %edge.target.name,
                    "Graph edge endpoint missing, edge skipped"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // NODES
    // ========================================================================

    pub async fn create_domain_node(&self, domain: &Domain) -> QuiverResult<()> {
        self.merge_node("create_domain_node", project::domain_node(domain))
            .await
    }

    pub async fn create_capability_node(&self, capability: &Capability) -> QuiverResult<()> {
        self.merge_node("create_capability_node", project::capability_node(capability))
            .await
    }

    pub async fn create_skill_node(&self, skill: &Skill) -> QuiverResult<()> {
        self.merge_node("create_skill_node", project::skill_node(skill))
            .await
    }

    pub async fn create_tool_node(&self, tool: &Tool) -> QuiverResult<()> {
        self.merge_node("create_tool_node", project::tool_node(tool))
            .await
    }

    /// Mirror a workflow, replacing any step nodes from an earlier version.
    pub async fn create_workflow(&self, workflow: &Workflow) -> QuiverResult<()> {
        let tenant = workflow.tenant_name.as_str();
        let key = project::key(NodeLabel::Workflow, &workflow.name, tenant);
        let old_steps = self
            .graph
            .neighbors(EdgeKind::HasStep, &key, Direction::Outgoing)
            .await;
        if let Some(old_steps) = self.absorb("create_workflow", old_steps)? {
            for step in old_steps {
                let result = self.graph.delete_node(&step.key).await;
                self.absorb("create_workflow", result)?;
            }
        }

        self.merge_node("create_workflow", project::workflow_node(workflow))
            .await?;
        for step in &workflow.steps {
            self.merge_node("create_workflow", project::workflow_step_node(workflow, step))
                .await?;
        }
        for edge in project::workflow_edges(workflow) {
            self.merge_edge("create_workflow", edge).await?;
        }
        Ok(())
    }

    // ========================================================================
    // EDGES
    // ========================================================================

    pub async fn create_has_capability_edge(
        &self,
        tenant: &str,
        domain: &str,
        capability: &str,
    ) -> QuiverResult<bool> {
        self.merge_edge(
            "create_has_capability_edge",
            GraphEdge::between(EdgeKind::HasCapability, tenant, domain, capability),
        )
        .await
    }

    pub async fn create_has_skill_edge(
        &self,
        tenant: &str,
        capability: &str,
        skill: &str,
    ) -> QuiverResult<bool> {
        self.merge_edge(
            "create_has_skill_edge",
            GraphEdge::between(EdgeKind::HasSkill, tenant, capability, skill),
        )
        .await
    }

    pub async fn create_has_tool_edge(
        &self,
        tenant: &str,
        capability: &str,
        tool: &str,
    ) -> QuiverResult<bool> {
        self.merge_edge(
            "create_has_tool_edge",
            GraphEdge::between(EdgeKind::HasTool, tenant, capability, tool),
        )
        .await
    }

    pub async fn create_uses_tool_edge(
        &self,
        tenant: &str,
        skill: &str,
        tool: &str,
        step: &ToolSkill,
    ) -> QuiverResult<bool> {
        self.merge_edge(
            "create_uses_tool_edge",
            project::uses_tool_edge(tenant, skill, tool, step),
        )
        .await
    }

    pub async fn create_next_tool_edge(
        &self,
        tenant: &str,
        source: &str,
        target: &str,
        composite_intent: Option<&str>,
    ) -> QuiverResult<bool> {
        self.merge_edge(
            "create_next_tool_edge",
            project::next_tool_edge(tenant, source, target, composite_intent),
        )
        .await
    }

    // ========================================================================
    // DELETES
    // ========================================================================

    pub async fn delete_domain_node(&self, tenant: &str, name: &str) -> QuiverResult<()> {
        let result = self
            .graph
            .delete_node(&project::key(NodeLabel::Domain, name, tenant))
            .await;
        self.absorb("delete_domain_node", result)?;
        Ok(())
    }

    pub async fn delete_capability_node(&self, tenant: &str, name: &str) -> QuiverResult<()> {
        let result = self
            .graph
            .delete_node(&project::key(NodeLabel::Capability, name, tenant))
            .await;
        self.absorb("delete_capability_node", result)?;
        Ok(())
    }

    pub async fn delete_skill_node(&self, tenant: &str, name: &str) -> QuiverResult<()> {
        let result = self
            .graph
            .delete_node(&project::key(NodeLabel::Skill, name, tenant))
            .await;
        self.absorb("delete_skill_node", result)?;
        Ok(())
    }

    /// Drop every USES_TOOL edge of a skill before its chain is rewritten.
    pub async fn remove_uses_tool_edges(&self, tenant: &str, skill: &str) -> QuiverResult<()> {
        let result = self
            .graph
            .delete_edges(
                EdgeKind::UsesTool,
                &project::key(NodeLabel::Skill, skill, tenant),
                Direction::Outgoing,
            )
            .await;
        self.absorb("remove_uses_tool_edges", result)?;
        Ok(())
    }

    /// Remove a tool from the graph.
    ///
    /// Skills using only this tool go with it; multi-tool skills lose just
    /// their USES_TOOL edge. NEXT_TOOL edges in both directions and incoming
    /// HAS_TOOL edges are removed before the node itself.
    pub async fn delete_tool_node(&self, tenant: &str, tool: &str) -> QuiverResult<()> {
        let result = self.detach_tool(tenant, tool).await;
        self.absorb("delete_tool_node", result)?;
        Ok(())
    }

    async fn detach_tool(&self, tenant: &str, tool: &str) -> GraphResult<()> {
        let tool_key = project::key(NodeLabel::Tool, tool, tenant);
        let skills = self
            .graph
            .neighbors(EdgeKind::UsesTool, &tool_key, Direction::Incoming)
            .await?;
        for skill in skills {
            let used = self
                .graph
                .neighbors(EdgeKind::UsesTool, &skill.key, Direction::Outgoing)
                .await?;
            if used.iter().all(|t| t.key == tool_key) {
                self.graph.delete_node(&skill.key).await?;
            } else {
                self.graph
                    .delete_edge(EdgeKind::UsesTool, &skill.key, &tool_key)
                    .await?;
            }
        }
        self.graph
            .delete_edges(EdgeKind::NextTool, &tool_key, Direction::Both)
            .await?;
        self.graph
            .delete_edges(EdgeKind::HasTool, &tool_key, Direction::Incoming)
            .await?;
        self.graph.delete_node(&tool_key).await?;
        Ok(())
    }

    /// Record that relationship inference has run for a tool.
    pub async fn mark_tool_analyzed(&self, tenant: &str, tool: &str) -> QuiverResult<()> {
        let mut props = Properties::new();
        props.insert(ANALYZED.to_string(), Value::Bool(true));
        let result = self
            .graph
            .set_node_properties(&project::key(NodeLabel::Tool, tool, tenant), &props)
            .await;
        if let Some(false) = self.absorb("mark_tool_analyzed", result)? {
            tracing::warn!(tenant = %tenant, tool = %tool, "No tool node to mark analyzed");
        }
        Ok(())
    }

    // ========================================================================
    // READ CHECKS
    // ========================================================================

    pub async fn has_tool_node(&self, tenant: &str, tool: &str) -> QuiverResult<bool> {
        let node = self
            .graph
            .node(&project::key(NodeLabel::Tool, tool, tenant))
            .await?;
        Ok(node.is_some())
    }

    pub async fn tool_has_skills_in_graph(&self, tenant: &str, tool: &str) -> QuiverResult<bool> {
        let skills = self
            .graph
            .neighbors(
                EdgeKind::UsesTool,
                &project::key(NodeLabel::Tool, tool, tenant),
                Direction::Incoming,
            )
            .await?;
        Ok(!skills.is_empty())
    }

    pub async fn is_tool_analyzed(&self, tenant: &str, tool: &str) -> QuiverResult<bool> {
        let node = self
            .graph
            .node(&project::key(NodeLabel::Tool, tool, tenant))
            .await?;
        Ok(node
            .and_then(|n| n.properties.get(ANALYZED).and_then(Value::as_bool))
            .unwrap_or(false))
    }

    /// Candidate paths over the capability's tools and their NEXT_TOOL edges.
    pub async fn get_tool_candidate_paths(
        &self,
        tenant: &str,
        capability: &str,
        src_tool: Option<&str>,
    ) -> QuiverResult<Vec<CandidatePath>> {
        let tools: Vec<String> = self
            .graph
            .neighbors(
                EdgeKind::HasTool,
                &project::key(NodeLabel::Capability, capability, tenant),
                Direction::Outgoing,
            )
            .await?
            .into_iter()
            .map(|n| n.key.name)
            .collect();
        if tools.is_empty() {
            return Ok(Vec::new());
        }
        let edges: Vec<(String, String)> = self
            .graph
            .edges_among(EdgeKind::NextTool, tenant, &tools)
            .await?
            .into_iter()
            .map(|e| (e.source.name, e.target.name))
            .collect();
        tracing::debug!(
            tenant = %tenant,
            capability = %capability,
            tools = tools.len(),
            edges = edges.len(),
            "Computing candidate paths"
        );
        Ok(candidate_paths(&tools, &edges, src_tool))
    }
}

impl std::fmt::Debug for GraphMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphMirror")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGraph;
    use crate::store::NodeKey;
    use quiver_core::{new_tool_id, GraphError};

    fn mirror() -> (GraphMirror, InMemoryGraph) {
        let graph = InMemoryGraph::new();
        (GraphMirror::new(Arc::new(graph.clone())), graph)
    }

    fn step(skill: &str, idx: i32) -> ToolSkill {
        ToolSkill {
            tenant_name: "acme".into(),
            tool_id: new_tool_id(),
            skill_name: skill.into(),
            step_index: idx,
            step_intent: None,
        }
    }

    async fn seed_tools(mirror: &GraphMirror, names: &[&str]) {
        mirror
            .create_capability_node(&Capability::new("billing", "acme"))
            .await
            .unwrap();
        for name in names {
            mirror
                .create_tool_node(&Tool::new(*name, "acme", ""))
                .await
                .unwrap();
            assert!(mirror
                .create_has_tool_edge("acme", "billing", name)
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_delete_tool_node_removes_sole_tool_skills_only() {
        let (mirror, graph) = mirror();
        seed_tools(&mirror, &["a", "b"]).await;
        for skill in ["solo", "pair"] {
            mirror
                .create_skill_node(&Skill::new(skill, "acme"))
                .await
                .unwrap();
        }
        mirror
            .create_uses_tool_edge("acme", "solo", "a", &step("solo", 0))
            .await
            .unwrap();
        mirror
            .create_uses_tool_edge("acme", "pair", "a", &step("pair", 0))
            .await
            .unwrap();
        mirror
            .create_uses_tool_edge("acme", "pair", "b", &step("pair", 1))
            .await
            .unwrap();
        mirror
            .create_next_tool_edge("acme", "a", "b", None)
            .await
            .unwrap();

        mirror.delete_tool_node("acme", "a").await.unwrap();

        let solo = NodeKey::new(NodeLabel::Skill, "solo", "acme");
        let pair = NodeKey::new(NodeLabel::Skill, "pair", "acme");
        assert!(graph.node(&solo).await.unwrap().is_none());
        assert!(graph.node(&pair).await.unwrap().is_some());
        assert!(!mirror.has_tool_node("acme", "a").await.unwrap());
        let used = graph
            .neighbors(EdgeKind::UsesTool, &pair, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].key.name, "b");
        let nexts = graph
            .edges_among(EdgeKind::NextTool, "acme", &["a".into(), "b".into()])
            .await
            .unwrap();
        assert!(nexts.is_empty());
    }

    #[tokio::test]
    async fn test_writes_tolerate_unavailable_graph() {
        let (mirror, graph) = mirror();
        graph.set_unavailable(true);
        assert!(mirror
            .create_domain_node(&Domain::new("sales", "acme"))
            .await
            .is_ok());
        assert!(!mirror
            .create_has_capability_edge("acme", "sales", "leads")
            .await
            .unwrap());
        assert!(mirror.delete_tool_node("acme", "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_read_checks_propagate_errors() {
        let (mirror, graph) = mirror();
        graph.set_unavailable(true);
        assert!(matches!(
            mirror.has_tool_node("acme", "a").await,
            Err(QuiverError::Graph(GraphError::Unavailable { .. }))
        ));
        assert!(mirror.is_tool_analyzed("acme", "a").await.is_err());
        assert!(mirror
            .get_tool_candidate_paths("acme", "billing", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_strict_mode_surfaces_logic_errors() {
        let (lenient, graph) = mirror();
        let strict = lenient.clone().with_strict(true);

        graph.fail_next(GraphError::InvalidResponse {
            reason: "garbage".into(),
        });
        assert!(lenient
            .create_domain_node(&Domain::new("sales", "acme"))
            .await
            .is_ok());

        graph.fail_next(GraphError::InvalidResponse {
            reason: "garbage".into(),
        });
        assert!(matches!(
            strict.create_domain_node(&Domain::new("sales", "acme")).await,
            Err(QuiverError::Graph(GraphError::InvalidResponse { .. }))
        ));

        // Recoverable errors stay swallowed even when strict.
        graph.fail_next(GraphError::Query {
            code: "Neo.TransientError".into(),
            message: "deadlock".into(),
        });
        assert!(strict
            .create_domain_node(&Domain::new("sales", "acme"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_mark_and_check_analyzed() {
        let (mirror, _graph) = mirror();
        seed_tools(&mirror, &["a"]).await;
        assert!(!mirror.is_tool_analyzed("acme", "a").await.unwrap());
        mirror.mark_tool_analyzed("acme", "a").await.unwrap();
        assert!(mirror.is_tool_analyzed("acme", "a").await.unwrap());
        assert!(!mirror.is_tool_analyzed("acme", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_candidate_paths_from_graph() {
        let (mirror, _graph) = mirror();
        seed_tools(&mirror, &["a", "b", "c", "d"]).await;
        mirror.create_next_tool_edge("acme", "a", "b", None).await.unwrap();
        mirror.create_next_tool_edge("acme", "b", "c", None).await.unwrap();

        let paths = mirror
            .get_tool_candidate_paths("acme", "billing", None)
            .await
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].tools, vec!["a", "b", "c"]);
        assert_eq!(paths[1].tools, vec!["d"]);

        let only_d = mirror
            .get_tool_candidate_paths("acme", "billing", Some("d"))
            .await
            .unwrap();
        assert_eq!(only_d.len(), 1);
        assert_eq!(only_d[0].tools, vec!["d"]);
    }

    #[tokio::test]
    async fn test_workflow_reupsert_replaces_steps() {
        use quiver_core::WorkflowStep;
        let (mirror, graph) = mirror();
        let mut workflow = Workflow::new("onboard", "acme");
        workflow.steps = (0..3)
            .map(|i| WorkflowStep {
                step_index: i,
                name: format!("s{}", i),
                intent: None,
                domains: Vec::new(),
                capabilities: Vec::new(),
            })
            .collect();
        mirror.create_workflow(&workflow).await.unwrap();
        assert_eq!(graph.counts(Some("acme")).await.unwrap().nodes, 4);

        workflow.steps.truncate(1);
        mirror.create_workflow(&workflow).await.unwrap();
        let counts = graph.counts(Some("acme")).await.unwrap();
        assert_eq!(counts.nodes, 2);
        assert_eq!(counts.edges, 1);
    }
}
