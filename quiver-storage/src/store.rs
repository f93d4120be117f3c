//! Async entity store trait.
//!
//! One trait covers the relational side of the registry: entity upserts and
//! cascading deletes, join rows, and the narrow join-path queries the tool
//! resolver composes. Link operations return `Ok(false)` instead of failing
//! when an endpoint is missing or belongs to another tenant, so callers can
//! log and skip.

use ::async_trait::async_trait;
use quiver_core::{
    Agent, ApplicationTool, Capability, CapabilitySkill, CapabilityTool, Domain,
    DomainCapability, EmbeddingVector, QuiverResult, Role, RoleAgent, RoleDomain, RoleUser,
    Skill, Tenant, Tool, ToolChain, ToolId, ToolRel, ToolSkill, User, UserAgent, Workflow,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// OPERATION PAYLOADS
// ============================================================================

/// Everything `skill_ingest` writes in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillIngest {
    /// Skill row, already carrying the name it should be stored under.
    pub skill: Skill,
    /// Replacement ToolSkill rows, steps numbered from 0.
    pub steps: Vec<ToolSkill>,
    /// Capabilities to link the skill under.
    pub capabilities: Vec<String>,
}

/// Result of a skill ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillIngestOutcome {
    /// True when no skill row existed under this name.
    pub created: bool,
    /// Tool ids the skill used before this ingest.
    pub previous_tool_ids: Vec<ToolId>,
    pub linked_capabilities: Vec<String>,
    /// Capabilities that do not exist in the tenant.
    pub skipped_capabilities: Vec<String>,
}

/// What a tool delete removed from the relational side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeletion {
    pub tool: Tool,
    /// Skills whose only tool was this one; deleted with their links.
    pub removed_skills: Vec<String>,
    /// Multi-tool skills that lost their step for this tool.
    pub trimmed_skills: Vec<String>,
}

/// A general tool ranked by cosine distance to a query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTool {
    pub tool: Tool,
    pub distance: f32,
}

// ============================================================================
// ENTITY STORE TRAIT
// ============================================================================

#[async_trait]
pub trait EntityStore: Send + Sync {
    // ========================================================================
    // TENANT AND IAM
    // ========================================================================

    async fn tenant_upsert(&self, tenant: &Tenant) -> QuiverResult<()>;

    /// All tenant names, sorted.
    async fn tenant_list(&self) -> QuiverResult<Vec<String>>;

    async fn role_upsert(&self, role: &Role) -> QuiverResult<()>;

    async fn user_upsert(&self, user: &User) -> QuiverResult<()>;

    async fn agent_upsert(&self, agent: &Agent) -> QuiverResult<()>;

    async fn role_domain_link(&self, link: &RoleDomain) -> QuiverResult<bool>;

    async fn role_agent_link(&self, link: &RoleAgent) -> QuiverResult<bool>;

    async fn role_user_link(&self, link: &RoleUser) -> QuiverResult<bool>;

    async fn user_agent_link(&self, link: &UserAgent) -> QuiverResult<bool>;

    // ========================================================================
    // DOMAINS AND CAPABILITIES
    // ========================================================================

    async fn domain_upsert(&self, domain: &Domain) -> QuiverResult<()>;

    async fn domain_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Domain>>;

    async fn domain_list(&self, tenant: &str) -> QuiverResult<Vec<Domain>>;

    /// Delete a domain with its DomainCapability, RoleDomain and step links.
    /// Returns false when the domain did not exist.
    async fn domain_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool>;

    async fn capability_upsert(&self, capability: &Capability) -> QuiverResult<()>;

    async fn capability_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Capability>>;

    async fn capability_list(&self, tenant: &str) -> QuiverResult<Vec<Capability>>;

    /// Delete a capability with its DomainCapability, CapabilitySkill,
    /// CapabilityTool and step links.
    async fn capability_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool>;

    async fn domain_capability_link(&self, link: &DomainCapability) -> QuiverResult<bool>;

    async fn domain_capability_list(&self, tenant: &str) -> QuiverResult<Vec<DomainCapability>>;

    // ========================================================================
    // SKILLS
    // ========================================================================

    async fn skill_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Skill>>;

    async fn skill_list(&self, tenant: &str) -> QuiverResult<Vec<Skill>>;

    /// Upsert the skill, replace its ToolSkill rows and add capability links,
    /// atomically.
    async fn skill_ingest(&self, ingest: &SkillIngest) -> QuiverResult<SkillIngestOutcome>;

    /// Skill whose (tool_id, step_index) pairs are exactly `chain`.
    async fn skill_find_by_tool_chain(
        &self,
        tenant: &str,
        chain: &ToolChain,
    ) -> QuiverResult<Option<Skill>>;

    /// Delete a skill with its ToolSkill and CapabilitySkill rows.
    async fn skill_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool>;

    async fn capability_skill_link(&self, link: &CapabilitySkill) -> QuiverResult<bool>;

    async fn capability_skill_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilitySkill>>;

    /// ToolSkill rows, ordered by skill then step.
    async fn tool_skill_list(&self, tenant: &str) -> QuiverResult<Vec<ToolSkill>>;

    // ========================================================================
    // TOOLS
    // ========================================================================

    /// Insert or update on `(name, tenant)`. A different id for an existing
    /// `(name, tenant)` fails with `DuplicateTool`. Returns the stored row.
    async fn tool_upsert(&self, tool: &Tool) -> QuiverResult<Tool>;

    async fn tool_get(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<Tool>>;

    async fn tool_get_by_name(&self, tenant: &str, name: &str) -> QuiverResult<Option<Tool>>;

    async fn tool_list(&self, tenant: &str) -> QuiverResult<Vec<Tool>>;

    /// Delete a tool and cascade through CapabilityTool, ToolSkill, ToolRel,
    /// ApplicationTool and orphaned skills, atomically. `None` when absent.
    async fn tool_delete(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<ToolDeletion>>;

    async fn capability_tool_link(&self, link: &CapabilityTool) -> QuiverResult<bool>;

    async fn capability_tool_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilityTool>>;

    async fn application_tool_link(&self, link: &ApplicationTool) -> QuiverResult<bool>;

    /// Upsert on (source, target). Returns false when either tool is missing.
    async fn tool_rel_upsert(&self, rel: &ToolRel) -> QuiverResult<bool>;

    async fn tool_rel_list(&self, tenant: &str) -> QuiverResult<Vec<ToolRel>>;

    // ========================================================================
    // WORKFLOWS
    // ========================================================================

    /// Upsert a workflow and replace its steps. Step links to missing domains
    /// or capabilities are dropped; the returned workflow is what was stored.
    async fn workflow_upsert(&self, workflow: &Workflow) -> QuiverResult<Workflow>;

    async fn workflow_list(&self, tenant: &str) -> QuiverResult<Vec<Workflow>>;

    // ========================================================================
    // RESOLVER JOIN PATHS
    // ========================================================================

    /// RoleAgent: roles held by an agent.
    async fn agent_role_names(&self, tenant: &str, agent_id: &str) -> QuiverResult<Vec<String>>;

    /// RoleDomain: domains granted to a role.
    async fn role_domain_names(&self, tenant: &str, role: &str) -> QuiverResult<Vec<String>>;

    /// DomainCapability: capabilities under a domain.
    async fn domain_capability_names(&self, tenant: &str, domain: &str)
        -> QuiverResult<Vec<String>>;

    /// CapabilityTool: tools linked directly to any of the capabilities.
    async fn tool_ids_via_capability_tools(
        &self,
        tenant: &str,
        capabilities: &[String],
    ) -> QuiverResult<HashSet<ToolId>>;

    /// CapabilitySkill then ToolSkill: tools used by skills of the
    /// capabilities, optionally only the named skills.
    async fn tool_ids_via_capability_skills(
        &self,
        tenant: &str,
        capabilities: &[String],
        skills: Option<&[String]>,
    ) -> QuiverResult<HashSet<ToolId>>;

    /// Capabilities a tool is linked to through CapabilityTool.
    async fn tool_capability_names(&self, tenant: &str, tool_id: ToolId)
        -> QuiverResult<Vec<String>>;

    // ========================================================================
    // TOOL SEARCH
    // ========================================================================

    async fn system_tools(&self, tenant: &str) -> QuiverResult<Vec<Tool>>;

    /// General tools, optionally restricted to `ids`.
    async fn general_tools(
        &self,
        tenant: &str,
        ids: Option<&HashSet<ToolId>>,
    ) -> QuiverResult<Vec<Tool>>;

    /// Nearest general tools by cosine distance, ascending, at most `k`.
    /// Tools without an embedding never match.
    async fn nearest_general_tools(
        &self,
        tenant: &str,
        query: &EmbeddingVector,
        ids: Option<&HashSet<ToolId>>,
        k: usize,
    ) -> QuiverResult<Vec<RankedTool>>;
}
