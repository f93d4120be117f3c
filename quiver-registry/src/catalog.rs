//! Registry writes: tools, the business hierarchy, workflows, tool
//! relationships and IAM rows.
//!
//! Each write commits relationally, then mirrors into the graph. Links to
//! endpoints that do not exist are skipped with a warning and reported as
//! `false`.

use crate::registry::Registry;
use quiver_core::{
    Agent, ApplicationTool, Capability, CapabilitySkill, CapabilityTool, Domain, DomainCapability,
    EmbeddingVector, EntityType, QuiverError, QuiverResult, Role, RoleAgent, RoleDomain,
    RoleUser, StorageError, Tenant, Tool, ToolId, ToolRel, User, UserAgent, ValidationError,
    Workflow,
};
use quiver_storage::ToolDeletion;

fn not_found(entity_type: EntityType, tenant: &str, key: &str) -> QuiverError {
    QuiverError::Storage(StorageError::NotFound {
        entity_type,
        tenant: tenant.to_string(),
        key: key.to_string(),
    })
}

fn require_name(field: &str, value: &str) -> QuiverResult<()> {
    if value.trim().is_empty() {
        return Err(QuiverError::Validation(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }));
    }
    Ok(())
}

impl Registry {
    async fn embed_text(&self, text: &str) -> QuiverResult<EmbeddingVector> {
        self.embedder.embed(text).await
    }

    // ========================================================================
    // TOOLS
    // ========================================================================

    /// Embed and store a tool, then link it under `capabilities`.
    ///
    /// Fails with `DuplicateTool` when `(name, tenant)` is taken by another id.
    pub async fn register_tool(&self, tool: Tool, capabilities: &[String]) -> QuiverResult<Tool> {
        require_name("name", &tool.name)?;
        require_name("tenant", &tool.tenant)?;

        let previous = self.store.tool_get(&tool.tenant, tool.id).await?;
        let embedding = self.embed_text(tool.embedding_text()).await?;
        let stored = self.store.tool_upsert(&tool.with_embedding(embedding)).await?;
        // Graph nodes are keyed by name, so a rename leaves the old node behind.
        if let Some(previous) = previous.filter(|p| p.name != stored.name) {
            self.mirror
                .delete_tool_node(&stored.tenant, &previous.name)
                .await?;
        }
        self.mirror.create_tool_node(&stored).await?;

        for capability in capabilities {
            self.link_capability_tool(&stored.tenant, capability, stored.id)
                .await?;
        }

        tracing::info!(
            tenant = %stored.tenant,
            tool = %stored.name,
            tool_id = %stored.id,
            tool_type = %stored.tool_type,
            "Tool registered"
        );
        Ok(stored)
    }

    /// Remove a tool with its relational cascade, then from the graph.
    pub async fn delete_tool(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<ToolDeletion>> {
        let Some(deletion) = self.store.tool_delete(tenant, id).await? else {
            return Ok(None);
        };
        self.mirror
            .delete_tool_node(tenant, &deletion.tool.name)
            .await?;
        // Skill nodes whose USES_TOOL edges never landed are not reached above.
        for skill in &deletion.removed_skills {
            self.mirror.delete_skill_node(tenant, skill).await?;
        }
        tracing::info!(
            tenant = %tenant,
            tool = %deletion.tool.name,
            removed_skills = ?deletion.removed_skills,
            trimmed_skills = ?deletion.trimmed_skills,
            "Tool deleted"
        );
        Ok(Some(deletion))
    }

    /// Record that an application exposes a tool. Relational only.
    pub async fn link_application_tool(
        &self,
        tenant: &str,
        application: &str,
        tool_id: ToolId,
    ) -> QuiverResult<bool> {
        require_name("application_name", application)?;
        let link = ApplicationTool {
            tenant_name: tenant.to_string(),
            application_name: application.to_string(),
            tool_id,
        };
        let linked = self.store.application_tool_link(&link).await?;
        if !linked {
            tracing::warn!(
                tenant = %tenant,
                application = %application,
                tool_id = %tool_id,
                "Tool missing, application link skipped"
            );
        }
        Ok(linked)
    }

    // ========================================================================
    // DOMAINS AND CAPABILITIES
    // ========================================================================

    /// Upsert a domain, embedding its description when no vector is given.
    pub async fn upsert_domain(&self, mut domain: Domain) -> QuiverResult<Domain> {
        require_name("name", &domain.name)?;
        if domain.embedding.is_none() {
            let text = domain.description.as_deref().unwrap_or(&domain.name);
            domain.embedding = Some(self.embed_text(text).await?);
        }
        self.store.domain_upsert(&domain).await?;
        self.mirror.create_domain_node(&domain).await?;
        Ok(domain)
    }

    pub async fn delete_domain(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let deleted = self.store.domain_delete(tenant, name).await?;
        if deleted {
            self.mirror.delete_domain_node(tenant, name).await?;
        }
        Ok(deleted)
    }

    /// Upsert a capability and link it under `domains`.
    pub async fn upsert_capability(
        &self,
        mut capability: Capability,
        domains: &[String],
    ) -> QuiverResult<Capability> {
        require_name("name", &capability.name)?;
        if capability.embedding.is_none() {
            let text = capability.description.as_deref().unwrap_or(&capability.name);
            capability.embedding = Some(self.embed_text(text).await?);
        }
        self.store.capability_upsert(&capability).await?;
        self.mirror.create_capability_node(&capability).await?;
        for domain in domains {
            self.link_domain_capability(&capability.tenant_name, domain, &capability.name)
                .await?;
        }
        Ok(capability)
    }

    pub async fn delete_capability(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let deleted = self.store.capability_delete(tenant, name).await?;
        if deleted {
            self.mirror.delete_capability_node(tenant, name).await?;
        }
        Ok(deleted)
    }

    pub async fn link_domain_capability(
        &self,
        tenant: &str,
        domain: &str,
        capability: &str,
    ) -> QuiverResult<bool> {
        let link = DomainCapability {
            tenant_name: tenant.to_string(),
            domain_name: domain.to_string(),
            capability_name: capability.to_string(),
        };
        if !self.store.domain_capability_link(&link).await? {
            tracing::warn!(
                tenant = %tenant,
                domain = %domain,
                capability = %capability,
                "Domain or capability missing, link skipped"
            );
            return Ok(false);
        }
        self.mirror
            .create_has_capability_edge(tenant, domain, capability)
            .await?;
        Ok(true)
    }

    pub async fn link_capability_tool(
        &self,
        tenant: &str,
        capability: &str,
        tool_id: ToolId,
    ) -> QuiverResult<bool> {
        let link = CapabilityTool {
            tenant_name: tenant.to_string(),
            capability_name: capability.to_string(),
            tool_id,
        };
        if !self.store.capability_tool_link(&link).await? {
            tracing::warn!(
                tenant = %tenant,
                capability = %capability,
                tool_id = %tool_id,
                "Capability or tool missing, link skipped"
            );
            return Ok(false);
        }
        if let Some(tool) = self.store.tool_get(tenant, tool_id).await? {
            self.mirror
                .create_has_tool_edge(tenant, capability, &tool.name)
                .await?;
        }
        Ok(true)
    }

    pub async fn link_capability_skill(
        &self,
        tenant: &str,
        capability: &str,
        skill: &str,
    ) -> QuiverResult<bool> {
        let link = CapabilitySkill {
            tenant_name: tenant.to_string(),
            capability_name: capability.to_string(),
            skill_name: skill.to_string(),
        };
        if !self.store.capability_skill_link(&link).await? {
            tracing::warn!(
                tenant = %tenant,
                capability = %capability,
                skill = %skill,
                "Capability or skill missing, link skipped"
            );
            return Ok(false);
        }
        self.mirror
            .create_has_skill_edge(tenant, capability, skill)
            .await?;
        Ok(true)
    }

    // ========================================================================
    // WORKFLOWS
    // ========================================================================

    /// Store a workflow with its ordered steps and mirror it. Step links to
    /// unknown domains or capabilities are dropped.
    pub async fn upsert_workflow(&self, workflow: &Workflow) -> QuiverResult<Workflow> {
        require_name("name", &workflow.name)?;
        let stored = self.store.workflow_upsert(workflow).await?;

        let requested: usize = workflow
            .steps
            .iter()
            .map(|s| s.domains.len() + s.capabilities.len())
            .sum();
        let kept: usize = stored
            .steps
            .iter()
            .map(|s| s.domains.len() + s.capabilities.len())
            .sum();
        if kept < requested {
            tracing::warn!(
                tenant = %stored.tenant_name,
                workflow = %stored.name,
                dropped = requested - kept,
                "Workflow step links to missing entities dropped"
            );
        }

        self.mirror.create_workflow(&stored).await?;
        Ok(stored)
    }

    // ========================================================================
    // TOOL RELATIONSHIPS
    // ========================================================================

    /// Record a data-flow relationship between two tools named in the same
    /// tenant and mirror it as a NEXT_TOOL edge. `NotFound` when either name
    /// does not resolve.
    pub async fn upsert_tool_rel(
        &self,
        tenant: &str,
        source_tool: &str,
        target_tool: &str,
        composite_intent: Option<String>,
        field_mapping: Option<serde_json::Value>,
    ) -> QuiverResult<ToolRel> {
        let source = self
            .store
            .tool_get_by_name(tenant, source_tool)
            .await?
            .ok_or_else(|| not_found(EntityType::Tool, tenant, source_tool))?;
        let target = self
            .store
            .tool_get_by_name(tenant, target_tool)
            .await?
            .ok_or_else(|| not_found(EntityType::Tool, tenant, target_tool))?;

        let rel = ToolRel {
            tenant_name: tenant.to_string(),
            source_tool_id: source.id,
            target_tool_id: target.id,
            composite_intent,
            field_mapping,
        };
        if !self.store.tool_rel_upsert(&rel).await? {
            return Err(not_found(
                EntityType::ToolRel,
                tenant,
                &format!("{}->{}", source_tool, target_tool),
            ));
        }
        self.mirror
            .create_next_tool_edge(
                tenant,
                &source.name,
                &target.name,
                rel.composite_intent.as_deref(),
            )
            .await?;
        Ok(rel)
    }

    // ========================================================================
    // IAM
    // ========================================================================

    pub async fn upsert_tenant(&self, name: &str) -> QuiverResult<()> {
        require_name("name", name)?;
        self.store.tenant_upsert(&Tenant::new(name)).await
    }

    pub async fn upsert_role(&self, role: &Role) -> QuiverResult<()> {
        require_name("name", &role.name)?;
        self.store.role_upsert(role).await
    }

    pub async fn upsert_user(&self, user: &User) -> QuiverResult<()> {
        require_name("user_id", &user.user_id)?;
        self.store.user_upsert(user).await
    }

    pub async fn upsert_agent(&self, agent: &Agent) -> QuiverResult<()> {
        require_name("agent_id", &agent.agent_id)?;
        self.store.agent_upsert(agent).await
    }

    pub async fn link_role_domain(&self, link: &RoleDomain) -> QuiverResult<bool> {
        let linked = self.store.role_domain_link(link).await?;
        if !linked {
            tracing::warn!(
                tenant = %link.tenant_name,
                role = %link.role_name,
                domain = %link.domain_name,
                "Role or domain missing, link skipped"
            );
        }
        Ok(linked)
    }

    pub async fn link_role_agent(&self, link: &RoleAgent) -> QuiverResult<bool> {
        let linked = self.store.role_agent_link(link).await?;
        if !linked {
            tracing::warn!(
                tenant = %link.tenant_name,
                role = %link.role_name,
                agent_id = %link.agent_id,
                "Role or agent missing, link skipped"
            );
        }
        Ok(linked)
    }

    pub async fn link_role_user(&self, link: &RoleUser) -> QuiverResult<bool> {
        let linked = self.store.role_user_link(link).await?;
        if !linked {
            tracing::warn!(
                tenant = %link.tenant_name,
                role = %link.role_name,
                user_id = %link.user_id,
                "Role or user missing, link skipped"
            );
        }
        Ok(linked)
    }

    pub async fn link_user_agent(&self, link: &UserAgent) -> QuiverResult<bool> {
        let linked = self.store.user_agent_link(link).await?;
        if !linked {
            tracing::warn!(
                tenant = %link.tenant_name,
                user_id = %link.user_id,
                agent_id = %link.agent_id,
                "User or agent missing, link skipped"
            );
        }
        Ok(linked)
    }
}
