//! Hierarchical tool resolution and tool search.
//!
//! Resolution narrows the general tools of a tenant in two stages. The agent
//! stage follows RoleAgent, RoleDomain, DomainCapability and CapabilityTool.
//! The filter stage resolves each role branch at the deepest level it names
//! and intersects it with the agent set. System tools skip both stages and
//! lead every result.

use crate::registry::Registry;
use quiver_core::{
    resolve_query, CapabilityFilter, DomainFilter, QuiverError, QuiverResult, RegistryError,
    RoleFilter, Tool, ToolFilter, ToolId, ToolType,
};
use quiver_storage::{EntityStore, RankedTool};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// Arguments of `search_mcp_tools`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub tenant_name: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub filter: Option<ToolFilter>,
    /// Overrides `filter.tool_query` when non-blank.
    #[serde(default)]
    pub tool_query: Option<String>,
    /// Cap on vector results; the configured default applies when absent.
    #[serde(default)]
    pub k: Option<usize>,
}

impl SearchRequest {
    pub fn new(tenant_name: impl Into<String>) -> Self {
        Self {
            tenant_name: tenant_name.into(),
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.tool_query = Some(query.into());
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }
}

/// One tool in a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSearchResult {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub document: serde_json::Value,
    /// Serialized as `null` when the tool has none.
    #[serde(default)]
    pub canonical_data: Option<serde_json::Value>,
    pub tenant: String,
    pub tool_type: ToolType,
    /// `1 - cosine distance`; only set on the vector path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosine_similarity: Option<f32>,
}

impl ToolSearchResult {
    fn from_tool(tool: Tool, cosine_similarity: Option<f32>) -> Self {
        Self {
            id: tool.id,
            name: tool.name,
            description: tool.description,
            document: tool.document,
            canonical_data: tool.canonical_data,
            tenant: tool.tenant,
            tool_type: tool.tool_type,
            cosine_similarity,
        }
    }
}

impl From<RankedTool> for ToolSearchResult {
    fn from(ranked: RankedTool) -> Self {
        Self::from_tool(ranked.tool, Some(1.0 - ranked.distance))
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Join-path walker for one tenant.
struct Resolver<'a> {
    store: &'a dyn EntityStore,
    tenant: &'a str,
}

impl<'a> Resolver<'a> {
    fn new(store: &'a dyn EntityStore, tenant: &'a str) -> Self {
        Self { store, tenant }
    }

    /// Tools an agent reaches through its roles. Only the CapabilityTool
    /// path counts here.
    async fn agent_tool_ids(&self, agent_id: &str) -> QuiverResult<HashSet<ToolId>> {
        let roles = self.store.agent_role_names(self.tenant, agent_id).await?;
        let mut capabilities = BTreeSet::new();
        for role in &roles {
            for domain in self.store.role_domain_names(self.tenant, role).await? {
                capabilities.extend(self.store.domain_capability_names(self.tenant, &domain).await?);
            }
        }
        let capabilities: Vec<String> = capabilities.into_iter().collect();
        tracing::debug!(
            tenant = %self.tenant,
            agent_id = %agent_id,
            roles = roles.len(),
            capabilities = capabilities.len(),
            "Resolved agent capabilities"
        );
        if capabilities.is_empty() {
            return Ok(HashSet::new());
        }
        self.store
            .tool_ids_via_capability_tools(self.tenant, &capabilities)
            .await
    }

    /// Tools under a role branch, resolved at the deepest level each
    /// sub-branch names. Names the role is not granted are ignored.
    async fn role_tool_ids(&self, role: &RoleFilter) -> QuiverResult<HashSet<ToolId>> {
        let granted = self.store.role_domain_names(self.tenant, &role.name).await?;
        let mut tools = HashSet::new();

        if role.domains.is_empty() {
            for domain in &granted {
                tools.extend(self.domain_tool_ids(domain).await?);
            }
            return Ok(tools);
        }

        for domain in &role.domains {
            if !granted.contains(&domain.name) {
                tracing::debug!(
                    tenant = %self.tenant,
                    role = %role.name,
                    domain = %domain.name,
                    "Domain not granted to role"
                );
                continue;
            }
            tools.extend(self.domain_branch_tool_ids(domain).await?);
        }
        Ok(tools)
    }

    async fn domain_branch_tool_ids(&self, domain: &DomainFilter) -> QuiverResult<HashSet<ToolId>> {
        if domain.capabilities.is_empty() {
            return self.domain_tool_ids(&domain.name).await;
        }
        let under = self
            .store
            .domain_capability_names(self.tenant, &domain.name)
            .await?;
        let mut tools = HashSet::new();
        for capability in &domain.capabilities {
            if !under.contains(&capability.name) {
                tracing::debug!(
                    tenant = %self.tenant,
                    domain = %domain.name,
                    capability = %capability.name,
                    "Capability not under domain"
                );
                continue;
            }
            tools.extend(self.capability_branch_tool_ids(capability).await?);
        }
        Ok(tools)
    }

    async fn capability_branch_tool_ids(
        &self,
        capability: &CapabilityFilter,
    ) -> QuiverResult<HashSet<ToolId>> {
        let names = [capability.name.clone()];
        if capability.skills.is_empty() {
            return self.capability_tool_ids(&names).await;
        }
        self.store
            .tool_ids_via_capability_skills(self.tenant, &names, Some(capability.skills.as_slice()))
            .await
    }

    async fn domain_tool_ids(&self, domain: &str) -> QuiverResult<HashSet<ToolId>> {
        let capabilities = self.store.domain_capability_names(self.tenant, domain).await?;
        self.capability_tool_ids(&capabilities).await
    }

    /// Union of the CapabilityTool and CapabilitySkill/ToolSkill paths.
    async fn capability_tool_ids(&self, capabilities: &[String]) -> QuiverResult<HashSet<ToolId>> {
        if capabilities.is_empty() {
            return Ok(HashSet::new());
        }
        let mut tools = self
            .store
            .tool_ids_via_capability_tools(self.tenant, capabilities)
            .await?;
        tools.extend(
            self.store
                .tool_ids_via_capability_skills(self.tenant, capabilities, None)
                .await?,
        );
        Ok(tools)
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Outcome of the resolver stages.
enum Constraint {
    /// No agent and no role filter.
    Unconstrained,
    /// Restrict domain results to these ids.
    Only(HashSet<ToolId>),
    /// A stage resolved to nothing: system tools only.
    SystemOnly,
}

impl Registry {
    /// General tools an agent may see, through its roles.
    pub async fn resolve_agent_tool_ids(
        &self,
        tenant: &str,
        agent_id: &str,
    ) -> QuiverResult<HashSet<ToolId>> {
        Resolver::new(self.store.as_ref(), tenant)
            .agent_tool_ids(agent_id)
            .await
    }

    /// General tools a role filter admits, before any agent intersection.
    pub async fn resolve_role_tool_ids(
        &self,
        tenant: &str,
        role: &RoleFilter,
    ) -> QuiverResult<HashSet<ToolId>> {
        Resolver::new(self.store.as_ref(), tenant)
            .role_tool_ids(role)
            .await
    }

    async fn constraint(&self, request: &SearchRequest) -> QuiverResult<Constraint> {
        let resolver = Resolver::new(self.store.as_ref(), &request.tenant_name);

        let agent_ids = match request.agent_id.as_deref() {
            Some(agent_id) => {
                let ids = resolver.agent_tool_ids(agent_id).await?;
                if ids.is_empty() {
                    tracing::debug!(
                        tenant = %request.tenant_name,
                        agent_id = %agent_id,
                        "Agent reaches no tools"
                    );
                    return Ok(Constraint::SystemOnly);
                }
                Some(ids)
            }
            None => None,
        };

        let roles = request
            .filter
            .as_ref()
            .map(|f| f.roles.as_slice())
            .unwrap_or_default();
        if roles.is_empty() {
            return Ok(agent_ids.map_or(Constraint::Unconstrained, Constraint::Only));
        }

        let mut filtered = HashSet::new();
        for role in roles {
            let mut ids = resolver.role_tool_ids(role).await?;
            if let Some(agent_ids) = &agent_ids {
                ids.retain(|id| agent_ids.contains(id));
            }
            tracing::debug!(
                tenant = %request.tenant_name,
                role = %role.name,
                depth = %role.depth(),
                tools = ids.len(),
                "Resolved role filter"
            );
            filtered.extend(ids);
        }
        if filtered.is_empty() {
            return Ok(Constraint::SystemOnly);
        }
        Ok(Constraint::Only(filtered))
    }

    /// Tools visible to a caller: every system tool of the tenant, then the
    /// general tools the agent and filter admit, ranked by similarity when a
    /// query is given.
    pub async fn search_mcp_tools(
        &self,
        request: &SearchRequest,
    ) -> QuiverResult<Vec<ToolSearchResult>> {
        if request.k == Some(0) {
            return Err(QuiverError::Registry(RegistryError::InvalidLimit { requested: 0 }));
        }
        let tenant = request.tenant_name.as_str();
        let k = self.search.effective_k(request.k);
        if self.search.clamps(request.k) {
            tracing::debug!(
                tenant = %tenant,
                requested = ?request.k,
                clamped = k,
                "Search limit clamped"
            );
        }

        let mut results: Vec<ToolSearchResult> = self
            .store
            .system_tools(tenant)
            .await?
            .into_iter()
            .map(|t| ToolSearchResult::from_tool(t, None))
            .collect();
        let system_count = results.len();

        let ids = match self.constraint(request).await? {
            Constraint::SystemOnly => return Ok(results),
            Constraint::Only(ids) => Some(ids),
            Constraint::Unconstrained => None,
        };

        match resolve_query(request.tool_query.as_deref(), request.filter.as_ref()) {
            Some(query) => {
                let embedding = self.embedder.embed(query).await?;
                let ranked = self
                    .store
                    .nearest_general_tools(tenant, &embedding, ids.as_ref(), k)
                    .await?;
                results.extend(ranked.into_iter().map(ToolSearchResult::from));
            }
            None => {
                let tools = self.store.general_tools(tenant, ids.as_ref()).await?;
                results.extend(tools.into_iter().map(|t| ToolSearchResult::from_tool(t, None)));
            }
        }

        tracing::debug!(
            tenant = %tenant,
            system = system_count,
            general = results.len() - system_count,
            "Tool search complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_omits_similarity_without_query() {
        let tool = Tool::new("lookup_lead", "acme", "Find a lead");
        let json = serde_json::to_value(ToolSearchResult::from_tool(tool, None)).unwrap();
        assert!(json.get("cosine_similarity").is_none());
        assert_eq!(json["tool_type"], "general");
    }

    #[test]
    fn test_result_always_carries_canonical_data() {
        let tool = Tool::new("t1", "acme", "d");
        let json = serde_json::to_value(ToolSearchResult::from_tool(tool, None)).unwrap();
        let object = json.as_object().unwrap();
        for field in ["id", "name", "description", "document", "canonical_data", "tenant", "tool_type"] {
            assert!(object.contains_key(field), "missing {}", field);
        }
        assert!(json["canonical_data"].is_null());
    }

    #[test]
    fn test_similarity_is_one_minus_distance() {
        let ranked = RankedTool {
            tool: Tool::new("t1", "acme", "t1"),
            distance: 0.25,
        };
        let result = ToolSearchResult::from(ranked);
        assert_eq!(result.cosine_similarity, Some(0.75));
    }

    #[test]
    fn test_request_deserializes_filter() {
        let json = r#"{"tenant_name":"acme","filter":{"roles":[{"name":"viewer"}]},"k":3}"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.k, Some(3));
        assert_eq!(request.filter.unwrap().roles[0].name, "viewer");
        assert!(request.agent_id.is_none());
    }
}
