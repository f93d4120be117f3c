//! Full resync of the graph from relational state.
//!
//! Each sync walks every tenant (or one) and re-merges the nodes and edges
//! derivable from the entity store. Merges are idempotent, so a sync can be
//! re-run at any time. Once the graph is unreachable the rest of that
//! tenant is skipped; graph-side query errors are counted and the sync
//! moves on.

use crate::mirror::GraphMirror;
use crate::project;
use crate::store::{GraphEdge, GraphNode, GraphResult};
use quiver_core::{GraphError, QuiverError, QuiverResult, ToolId};
use quiver_storage::EntityStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub tenants: usize,
    pub nodes_merged: usize,
    pub edges_merged: usize,
    /// Edges whose endpoint was not in the graph.
    pub edges_skipped: usize,
    /// Writes that failed with a graph-side or logic error.
    pub failures: usize,
    /// Tenants cut short because the graph became unreachable.
    pub aborted_tenants: Vec<String>,
}

impl SyncReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: SyncReport) {
        self.tenants = self.tenants.max(other.tenants);
        self.nodes_merged += other.nodes_merged;
        self.edges_merged += other.edges_merged;
        self.edges_skipped += other.edges_skipped;
        self.failures += other.failures;
        for tenant in other.aborted_tenants {
            if !self.aborted_tenants.contains(&tenant) {
                self.aborted_tenants.push(tenant);
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.aborted_tenants.is_empty()
    }
}

struct TenantSync<'a> {
    mirror: &'a GraphMirror,
    report: &'a mut SyncReport,
    tenant: &'a str,
    aborted: bool,
}

impl<'a> TenantSync<'a> {
    fn new(mirror: &'a GraphMirror, report: &'a mut SyncReport, tenant: &'a str) -> Self {
        report.tenants += 1;
        Self {
            mirror,
            report,
            tenant,
            aborted: false,
        }
    }

    fn check<T>(&mut self, result: GraphResult<T>) -> QuiverResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e @ GraphError::Unavailable { .. }) => {
                tracing::warn!(tenant = %self.tenant, error = %e, "Graph unavailable, tenant sync stopped");
                self.aborted = true;
                Ok(None)
            }
            Err(e @ GraphError::Query { .. }) => {
                tracing::warn!(tenant = %self.tenant, error = %e, "Graph write failed during sync");
                self.report.failures += 1;
                Ok(None)
            }
            Err(e) => {
                tracing::error!(tenant = %self.tenant, error = %e, "Graph sync error");
                self.report.failures += 1;
                if self.mirror.is_strict() {
                    Err(QuiverError::Graph(e))
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn node(&mut self, node: GraphNode) -> QuiverResult<()> {
        if self.aborted {
            return Ok(());
        }
        let result = self.mirror.graph().merge_node(&node).await;
        if self.check(result)?.is_some() {
            self.report.nodes_merged += 1;
        }
        Ok(())
    }

    async fn edge(&mut self, edge: GraphEdge) -> QuiverResult<()> {
        if self.aborted {
            return Ok(());
        }
        let result = self.mirror.graph().merge_edge(&edge).await;
        match self.check(result)? {
            Some(true) => self.report.edges_merged += 1,
            Some(false) => {
                tracing::debug!(
                    tenant = %self.tenant,
                    kind = %edge.kind,
                    source = %edge.source.name,
                    target = %edge.target.name,
                    "Sync skipped edge with missing endpoint"
                );
                self.report.edges_skipped += 1;
            }
            None => {}
        }
        Ok(())
    }

    fn finish(self) {
        if self.aborted {
            self.report.aborted_tenants.push(self.tenant.to_string());
        }
    }
}

async fn tenants(store: &dyn EntityStore, tenant: Option<&str>) -> QuiverResult<Vec<String>> {
    match tenant {
        Some(t) => Ok(vec![t.to_string()]),
        None => store.tenant_list().await,
    }
}

fn log_report(what: &str, report: &SyncReport) {
    tracing::info!(
        sync = what,
        tenants = report.tenants,
        nodes = report.nodes_merged,
        edges = report.edges_merged,
        skipped = report.edges_skipped,
        failures = report.failures,
        aborted = report.aborted_tenants.len(),
        "Graph sync finished"
    );
}

/// Domains, capabilities and HAS_CAPABILITY edges.
pub async fn sync_domains_from_db_to_graph(
    store: &dyn EntityStore,
    mirror: &GraphMirror,
    tenant: Option<&str>,
) -> QuiverResult<SyncReport> {
    let mut report = SyncReport::default();
    for tenant in tenants(store, tenant).await? {
        let domains = store.domain_list(&tenant).await?;
        let capabilities = store.capability_list(&tenant).await?;
        let links = store.domain_capability_list(&tenant).await?;

        let mut sync = TenantSync::new(mirror, &mut report, &tenant);
        for domain in &domains {
            sync.node(project::domain_node(domain)).await?;
        }
        for capability in &capabilities {
            sync.node(project::capability_node(capability)).await?;
        }
        for link in &links {
            sync.edge(GraphEdge::between(
                quiver_core::EdgeKind::HasCapability,
                &tenant,
                link.domain_name.as_str(),
                link.capability_name.as_str(),
            ))
            .await?;
        }
        sync.finish();
    }
    log_report("domains", &report);
    Ok(report)
}

/// Capabilities, skills, tools and the HAS_SKILL, HAS_TOOL, USES_TOOL and
/// NEXT_TOOL edges between them.
pub async fn sync_skills_tools_from_db_to_graph(
    store: &dyn EntityStore,
    mirror: &GraphMirror,
    tenant: Option<&str>,
) -> QuiverResult<SyncReport> {
    use quiver_core::EdgeKind;

    let mut report = SyncReport::default();
    for tenant in tenants(store, tenant).await? {
        let capabilities = store.capability_list(&tenant).await?;
        let skills = store.skill_list(&tenant).await?;
        let tools = store.tool_list(&tenant).await?;
        let capability_skills = store.capability_skill_list(&tenant).await?;
        let capability_tools = store.capability_tool_list(&tenant).await?;
        let tool_skills = store.tool_skill_list(&tenant).await?;
        let rels = store.tool_rel_list(&tenant).await?;

        let names: HashMap<ToolId, &str> =
            tools.iter().map(|t| (t.id, t.name.as_str())).collect();

        let mut sync = TenantSync::new(mirror, &mut report, &tenant);
        for capability in &capabilities {
            sync.node(project::capability_node(capability)).await?;
        }
        for skill in &skills {
            sync.node(project::skill_node(skill)).await?;
        }
        for tool in &tools {
            sync.node(project::tool_node(tool)).await?;
        }
        for link in &capability_skills {
            sync.edge(GraphEdge::between(
                EdgeKind::HasSkill,
                &tenant,
                link.capability_name.as_str(),
                link.skill_name.as_str(),
            ))
            .await?;
        }
        for link in &capability_tools {
            match names.get(&link.tool_id) {
                Some(tool) => {
                    sync.edge(GraphEdge::between(
                        EdgeKind::HasTool,
                        &tenant,
                        link.capability_name.as_str(),
                        *tool,
                    ))
                    .await?
                }
                None => sync.report.edges_skipped += 1,
            }
        }
        for step in &tool_skills {
            match names.get(&step.tool_id) {
                Some(tool) => {
                    sync.edge(project::uses_tool_edge(&tenant, &step.skill_name, tool, step))
                        .await?
                }
                None => sync.report.edges_skipped += 1,
            }
        }
        for rel in &rels {
            match (names.get(&rel.source_tool_id), names.get(&rel.target_tool_id)) {
                (Some(source), Some(target)) => {
                    sync.edge(project::next_tool_edge(
                        &tenant,
                        source,
                        target,
                        rel.composite_intent.as_deref(),
                    ))
                    .await?
                }
                _ => sync.report.edges_skipped += 1,
            }
        }
        sync.finish();
    }
    log_report("skills_tools", &report);
    Ok(report)
}

/// Workflows and their steps, with HAS_STEP, NEXT_STEP, IN_DOMAIN and
/// REQUIRES_CAPABILITY edges. Step links land only when the domain or
/// capability node is already in the graph.
pub async fn sync_workflows_from_db_to_graph(
    store: &dyn EntityStore,
    mirror: &GraphMirror,
    tenant: Option<&str>,
) -> QuiverResult<SyncReport> {
    let mut report = SyncReport::default();
    for tenant in tenants(store, tenant).await? {
        let workflows = store.workflow_list(&tenant).await?;

        let mut sync = TenantSync::new(mirror, &mut report, &tenant);
        for workflow in &workflows {
            sync.node(project::workflow_node(workflow)).await?;
            for step in &workflow.steps {
                sync.node(project::workflow_step_node(workflow, step)).await?;
            }
            for edge in project::workflow_edges(workflow) {
                sync.edge(edge).await?;
            }
        }
        sync.finish();
    }
    log_report("workflows", &report);
    Ok(report)
}
