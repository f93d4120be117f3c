//! In-memory entity store.
//!
//! All tables sit behind one lock so that cascades and skill ingests are
//! atomic the way a database transaction would make them.

use crate::{EntityStore, RankedTool, SkillIngest, SkillIngestOutcome, ToolDeletion};
use ::async_trait::async_trait;
use chrono::Utc;
use quiver_core::{
    Agent, ApplicationTool, Capability, CapabilitySkill, CapabilityTool, Domain,
    DomainCapability, EmbeddingVector, EntityType, QuiverError, QuiverResult, Role, RoleAgent,
    RoleDomain, RoleUser, Skill, StorageError, Tenant, Tool, ToolChain, ChainLink, ToolId,
    ToolRel, ToolSkill, User, UserAgent, ValidationError, Workflow,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// (tenant, name) natural key.
type Key = (String, String);

fn key(tenant: &str, name: &str) -> Key {
    (tenant.to_string(), name.to_string())
}

fn push_unique<T: PartialEq>(rows: &mut Vec<T>, row: T) {
    if !rows.contains(&row) {
        rows.push(row);
    }
}

#[derive(Debug, Default)]
struct Tables {
    tenants: BTreeMap<String, Tenant>,
    roles: BTreeMap<Key, Role>,
    users: BTreeMap<Key, User>,
    agents: BTreeMap<Key, Agent>,
    domains: BTreeMap<Key, Domain>,
    capabilities: BTreeMap<Key, Capability>,
    skills: BTreeMap<Key, Skill>,
    tools: BTreeMap<ToolId, Tool>,
    workflows: BTreeMap<Key, Workflow>,
    role_domains: Vec<RoleDomain>,
    role_agents: Vec<RoleAgent>,
    role_users: Vec<RoleUser>,
    user_agents: Vec<UserAgent>,
    domain_capabilities: Vec<DomainCapability>,
    capability_skills: Vec<CapabilitySkill>,
    capability_tools: Vec<CapabilityTool>,
    tool_skills: Vec<ToolSkill>,
    tool_rels: Vec<ToolRel>,
    application_tools: Vec<ApplicationTool>,
}

impl Tables {
    fn ensure_tenant(&mut self, tenant: &str) {
        self.tenants
            .entry(tenant.to_string())
            .or_insert_with(|| Tenant::new(tenant));
    }

    fn tool_in_tenant(&self, tenant: &str, id: ToolId) -> bool {
        self.tools.get(&id).is_some_and(|t| t.tenant == tenant)
    }

    fn chain_of(&self, tenant: &str, skill: &str) -> ToolChain {
        ToolChain::new(
            self.tool_skills
                .iter()
                .filter(|ts| ts.tenant_name == tenant && ts.skill_name == skill)
                .map(|ts| ChainLink {
                    step_index: ts.step_index,
                    tool_id: ts.tool_id,
                }),
        )
    }

    fn remove_skill(&mut self, tenant: &str, name: &str) -> bool {
        let existed = self.skills.remove(&key(tenant, name)).is_some();
        self.tool_skills
            .retain(|ts| !(ts.tenant_name == tenant && ts.skill_name == name));
        self.capability_skills
            .retain(|cs| !(cs.tenant_name == tenant && cs.skill_name == name));
        existed
    }
}

/// In-memory entity store for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct MockStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> QuiverResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| QuiverError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> QuiverResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| QuiverError::Storage(StorageError::LockPoisoned))
    }

    /// Drop every row.
    pub fn clear(&self) -> QuiverResult<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    /// Number of skill rows in a tenant.
    pub fn skill_count(&self, tenant: &str) -> QuiverResult<usize> {
        Ok(self
            .read()?
            .skills
            .keys()
            .filter(|(t, _)| t == tenant)
            .count())
    }

    /// Number of tool rows in a tenant.
    pub fn tool_count(&self, tenant: &str) -> QuiverResult<usize> {
        Ok(self
            .read()?
            .tools
            .values()
            .filter(|t| t.tenant == tenant)
            .count())
    }
}

#[async_trait]
impl EntityStore for MockStorage {
    // === Tenant and IAM ===

    async fn tenant_upsert(&self, tenant: &Tenant) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.tenants
            .entry(tenant.name.clone())
            .or_insert_with(|| tenant.clone());
        Ok(())
    }

    async fn tenant_list(&self) -> QuiverResult<Vec<String>> {
        Ok(self.read()?.tenants.keys().cloned().collect())
    }

    async fn role_upsert(&self, role: &Role) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.ensure_tenant(&role.tenant_name);
        t.roles
            .insert(key(&role.tenant_name, &role.name), role.clone());
        Ok(())
    }

    async fn user_upsert(&self, user: &User) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.ensure_tenant(&user.tenant_name);
        t.users
            .insert(key(&user.tenant_name, &user.user_id), user.clone());
        Ok(())
    }

    async fn agent_upsert(&self, agent: &Agent) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.ensure_tenant(&agent.tenant_name);
        t.agents
            .insert(key(&agent.tenant_name, &agent.agent_id), agent.clone());
        Ok(())
    }

    async fn role_domain_link(&self, link: &RoleDomain) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&key(&link.tenant_name, &link.role_name))
            || !t.domains.contains_key(&key(&link.tenant_name, &link.domain_name))
        {
            return Ok(false);
        }
        push_unique(&mut t.role_domains, link.clone());
        Ok(true)
    }

    async fn role_agent_link(&self, link: &RoleAgent) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&key(&link.tenant_name, &link.role_name))
            || !t.agents.contains_key(&key(&link.tenant_name, &link.agent_id))
        {
            return Ok(false);
        }
        push_unique(&mut t.role_agents, link.clone());
        Ok(true)
    }

    async fn role_user_link(&self, link: &RoleUser) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&key(&link.tenant_name, &link.role_name))
            || !t.users.contains_key(&key(&link.tenant_name, &link.user_id))
        {
            return Ok(false);
        }
        push_unique(&mut t.role_users, link.clone());
        Ok(true)
    }

    async fn user_agent_link(&self, link: &UserAgent) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.users.contains_key(&key(&link.tenant_name, &link.user_id))
            || !t.agents.contains_key(&key(&link.tenant_name, &link.agent_id))
        {
            return Ok(false);
        }
        push_unique(&mut t.user_agents, link.clone());
        Ok(true)
    }

    // === Domains and Capabilities ===

    async fn domain_upsert(&self, domain: &Domain) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.ensure_tenant(&domain.tenant_name);
        let k = key(&domain.tenant_name, &domain.name);
        let mut row = domain.clone();
        if let Some(existing) = t.domains.get(&k) {
            row.created_at = existing.created_at;
        }
        row.updated_at = Utc::now();
        t.domains.insert(k, row);
        Ok(())
    }

    async fn domain_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Domain>> {
        Ok(self.read()?.domains.get(&key(tenant, name)).cloned())
    }

    async fn domain_list(&self, tenant: &str) -> QuiverResult<Vec<Domain>> {
        Ok(self
            .read()?
            .domains
            .values()
            .filter(|d| d.tenant_name == tenant)
            .cloned()
            .collect())
    }

    async fn domain_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if t.domains.remove(&key(tenant, name)).is_none() {
            return Ok(false);
        }
        t.domain_capabilities
            .retain(|dc| !(dc.tenant_name == tenant && dc.domain_name == name));
        t.role_domains
            .retain(|rd| !(rd.tenant_name == tenant && rd.domain_name == name));
        for workflow in t.workflows.values_mut().filter(|w| w.tenant_name == tenant) {
            for step in &mut workflow.steps {
                step.domains.retain(|d| d != name);
            }
        }
        Ok(true)
    }

    async fn capability_upsert(&self, capability: &Capability) -> QuiverResult<()> {
        let mut t = self.write()?;
        t.ensure_tenant(&capability.tenant_name);
        let k = key(&capability.tenant_name, &capability.name);
        let mut row = capability.clone();
        if let Some(existing) = t.capabilities.get(&k) {
            row.created_at = existing.created_at;
        }
        row.updated_at = Utc::now();
        t.capabilities.insert(k, row);
        Ok(())
    }

    async fn capability_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Capability>> {
        Ok(self.read()?.capabilities.get(&key(tenant, name)).cloned())
    }

    async fn capability_list(&self, tenant: &str) -> QuiverResult<Vec<Capability>> {
        Ok(self
            .read()?
            .capabilities
            .values()
            .filter(|c| c.tenant_name == tenant)
            .cloned()
            .collect())
    }

    async fn capability_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if t.capabilities.remove(&key(tenant, name)).is_none() {
            return Ok(false);
        }
        t.domain_capabilities
            .retain(|dc| !(dc.tenant_name == tenant && dc.capability_name == name));
        t.capability_skills
            .retain(|cs| !(cs.tenant_name == tenant && cs.capability_name == name));
        t.capability_tools
            .retain(|ct| !(ct.tenant_name == tenant && ct.capability_name == name));
        for workflow in t.workflows.values_mut().filter(|w| w.tenant_name == tenant) {
            for step in &mut workflow.steps {
                step.capabilities.retain(|c| c != name);
            }
        }
        Ok(true)
    }

    async fn domain_capability_link(&self, link: &DomainCapability) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.domains.contains_key(&key(&link.tenant_name, &link.domain_name))
            || !t
                .capabilities
                .contains_key(&key(&link.tenant_name, &link.capability_name))
        {
            return Ok(false);
        }
        push_unique(&mut t.domain_capabilities, link.clone());
        Ok(true)
    }

    async fn domain_capability_list(&self, tenant: &str) -> QuiverResult<Vec<DomainCapability>> {
        Ok(self
            .read()?
            .domain_capabilities
            .iter()
            .filter(|dc| dc.tenant_name == tenant)
            .cloned()
            .collect())
    }

    // === Skills ===

    async fn skill_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Skill>> {
        Ok(self.read()?.skills.get(&key(tenant, name)).cloned())
    }

    async fn skill_list(&self, tenant: &str) -> QuiverResult<Vec<Skill>> {
        Ok(self
            .read()?
            .skills
            .values()
            .filter(|s| s.tenant_name == tenant)
            .cloned()
            .collect())
    }

    async fn skill_ingest(&self, ingest: &SkillIngest) -> QuiverResult<SkillIngestOutcome> {
        let mut t = self.write()?;
        let tenant = ingest.skill.tenant_name.clone();
        let name = ingest.skill.name.clone();

        // Validate before touching anything so a failure leaves no partial write.
        if let Some(step) = ingest
            .steps
            .iter()
            .find(|s| !t.tool_in_tenant(&tenant, s.tool_id))
        {
            return Err(QuiverError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Skill,
                reason: format!("tool {} is not registered in tenant '{}'", step.tool_id, tenant),
            }));
        }

        t.ensure_tenant(&tenant);
        let k = key(&tenant, &name);
        let mut row = ingest.skill.clone();
        let created = match t.skills.get(&k) {
            Some(existing) => {
                row.created_at = existing.created_at;
                false
            }
            None => true,
        };
        row.updated_at = Utc::now();
        t.skills.insert(k, row);

        let previous_tool_ids = t.chain_of(&tenant, &name).tool_ids();
        t.tool_skills
            .retain(|ts| !(ts.tenant_name == tenant && ts.skill_name == name));
        for step in &ingest.steps {
            push_unique(
                &mut t.tool_skills,
                ToolSkill {
                    tenant_name: tenant.clone(),
                    skill_name: name.clone(),
                    ..step.clone()
                },
            );
        }

        let mut outcome = SkillIngestOutcome {
            created,
            previous_tool_ids,
            ..Default::default()
        };
        for capability in &ingest.capabilities {
            if t.capabilities.contains_key(&key(&tenant, capability)) {
                push_unique(
                    &mut t.capability_skills,
                    CapabilitySkill {
                        tenant_name: tenant.clone(),
                        capability_name: capability.clone(),
                        skill_name: name.clone(),
                    },
                );
                outcome.linked_capabilities.push(capability.clone());
            } else {
                outcome.skipped_capabilities.push(capability.clone());
            }
        }
        Ok(outcome)
    }

    async fn skill_find_by_tool_chain(
        &self,
        tenant: &str,
        chain: &ToolChain,
    ) -> QuiverResult<Option<Skill>> {
        let t = self.read()?;
        Ok(t.skills
            .values()
            .filter(|s| s.tenant_name == tenant)
            .find(|s| t.chain_of(tenant, &s.name) == *chain)
            .cloned())
    }

    async fn skill_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        Ok(self.write()?.remove_skill(tenant, name))
    }

    async fn capability_skill_link(&self, link: &CapabilitySkill) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t
            .capabilities
            .contains_key(&key(&link.tenant_name, &link.capability_name))
            || !t.skills.contains_key(&key(&link.tenant_name, &link.skill_name))
        {
            return Ok(false);
        }
        push_unique(&mut t.capability_skills, link.clone());
        Ok(true)
    }

    async fn capability_skill_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilitySkill>> {
        Ok(self
            .read()?
            .capability_skills
            .iter()
            .filter(|cs| cs.tenant_name == tenant)
            .cloned()
            .collect())
    }

    async fn tool_skill_list(&self, tenant: &str) -> QuiverResult<Vec<ToolSkill>> {
        let mut rows: Vec<ToolSkill> = self
            .read()?
            .tool_skills
            .iter()
            .filter(|ts| ts.tenant_name == tenant)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.skill_name
                .cmp(&b.skill_name)
                .then(a.step_index.cmp(&b.step_index))
        });
        Ok(rows)
    }

    // === Tools ===

    async fn tool_upsert(&self, tool: &Tool) -> QuiverResult<Tool> {
        let mut t = self.write()?;
        if let Some(existing) = t
            .tools
            .values()
            .find(|x| x.tenant == tool.tenant && x.name == tool.name && x.id != tool.id)
        {
            return Err(QuiverError::Storage(StorageError::DuplicateTool {
                name: tool.name.clone(),
                tenant: tool.tenant.clone(),
                existing_id: existing.id,
            }));
        }

        let mut row = tool.clone();
        if let Some(existing) = t.tools.get(&tool.id) {
            if existing.tenant != tool.tenant {
                return Err(QuiverError::Validation(ValidationError::TenantMismatch {
                    entity_type: EntityType::Tool,
                    key: tool.id.to_string(),
                    expected: tool.tenant.clone(),
                    actual: existing.tenant.clone(),
                }));
            }
            row.created_at = existing.created_at;
        }
        row.updated_at = Utc::now();
        t.ensure_tenant(&tool.tenant);
        t.tools.insert(row.id, row.clone());
        Ok(row)
    }

    async fn tool_get(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<Tool>> {
        Ok(self
            .read()?
            .tools
            .get(&id)
            .filter(|t| t.tenant == tenant)
            .cloned())
    }

    async fn tool_get_by_name(&self, tenant: &str, name: &str) -> QuiverResult<Option<Tool>> {
        Ok(self
            .read()?
            .tools
            .values()
            .find(|t| t.tenant == tenant && t.name == name)
            .cloned())
    }

    async fn tool_list(&self, tenant: &str) -> QuiverResult<Vec<Tool>> {
        Ok(self
            .read()?
            .tools
            .values()
            .filter(|t| t.tenant == tenant)
            .cloned()
            .collect())
    }

    async fn tool_delete(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<ToolDeletion>> {
        let mut t = self.write()?;
        let Some(tool) = t.tools.get(&id).filter(|x| x.tenant == tenant).cloned() else {
            return Ok(None);
        };

        let using: BTreeSet<String> = t
            .tool_skills
            .iter()
            .filter(|ts| ts.tenant_name == tenant && ts.tool_id == id)
            .map(|ts| ts.skill_name.clone())
            .collect();

        let mut removed_skills = Vec::new();
        let mut trimmed_skills = Vec::new();
        for skill in using {
            let has_other_tools = t.tool_skills.iter().any(|ts| {
                ts.tenant_name == tenant && ts.skill_name == skill && ts.tool_id != id
            });
            if has_other_tools {
                trimmed_skills.push(skill);
            } else {
                removed_skills.push(skill);
            }
        }

        t.tool_skills
            .retain(|ts| !(ts.tenant_name == tenant && ts.tool_id == id));
        for skill in &removed_skills {
            t.remove_skill(tenant, skill);
        }
        t.capability_tools.retain(|ct| ct.tool_id != id);
        t.tool_rels
            .retain(|r| r.source_tool_id != id && r.target_tool_id != id);
        t.application_tools.retain(|at| at.tool_id != id);
        t.tools.remove(&id);

        Ok(Some(ToolDeletion {
            tool,
            removed_skills,
            trimmed_skills,
        }))
    }

    async fn capability_tool_link(&self, link: &CapabilityTool) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t
            .capabilities
            .contains_key(&key(&link.tenant_name, &link.capability_name))
            || !t.tool_in_tenant(&link.tenant_name, link.tool_id)
        {
            return Ok(false);
        }
        push_unique(&mut t.capability_tools, link.clone());
        Ok(true)
    }

    async fn capability_tool_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilityTool>> {
        Ok(self
            .read()?
            .capability_tools
            .iter()
            .filter(|ct| ct.tenant_name == tenant)
            .cloned()
            .collect())
    }

    async fn application_tool_link(&self, link: &ApplicationTool) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.tool_in_tenant(&link.tenant_name, link.tool_id) {
            return Ok(false);
        }
        push_unique(&mut t.application_tools, link.clone());
        Ok(true)
    }

    async fn tool_rel_upsert(&self, rel: &ToolRel) -> QuiverResult<bool> {
        let mut t = self.write()?;
        if !t.tool_in_tenant(&rel.tenant_name, rel.source_tool_id)
            || !t.tool_in_tenant(&rel.tenant_name, rel.target_tool_id)
        {
            return Ok(false);
        }
        t.tool_rels.retain(|r| {
            !(r.tenant_name == rel.tenant_name
                && r.source_tool_id == rel.source_tool_id
                && r.target_tool_id == rel.target_tool_id)
        });
        t.tool_rels.push(rel.clone());
        Ok(true)
    }

    async fn tool_rel_list(&self, tenant: &str) -> QuiverResult<Vec<ToolRel>> {
        Ok(self
            .read()?
            .tool_rels
            .iter()
            .filter(|r| r.tenant_name == tenant)
            .cloned()
            .collect())
    }

    // === Workflows ===

    async fn workflow_upsert(&self, workflow: &Workflow) -> QuiverResult<Workflow> {
        let mut t = self.write()?;
        let tenant = workflow.tenant_name.clone();
        t.ensure_tenant(&tenant);

        let mut row = workflow.clone();
        for step in &mut row.steps {
            step.domains
                .retain(|d| t.domains.contains_key(&key(&tenant, d)));
            step.capabilities
                .retain(|c| t.capabilities.contains_key(&key(&tenant, c)));
        }
        row.steps.sort_by_key(|s| s.step_index);

        let k = key(&tenant, &workflow.name);
        if let Some(existing) = t.workflows.get(&k) {
            row.created_at = existing.created_at;
        }
        row.updated_at = Utc::now();
        t.workflows.insert(k, row.clone());
        Ok(row)
    }

    async fn workflow_list(&self, tenant: &str) -> QuiverResult<Vec<Workflow>> {
        Ok(self
            .read()?
            .workflows
            .values()
            .filter(|w| w.tenant_name == tenant)
            .cloned()
            .collect())
    }

    // === Resolver join paths ===

    async fn agent_role_names(&self, tenant: &str, agent_id: &str) -> QuiverResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .read()?
            .role_agents
            .iter()
            .filter(|ra| ra.tenant_name == tenant && ra.agent_id == agent_id)
            .map(|ra| ra.role_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn role_domain_names(&self, tenant: &str, role: &str) -> QuiverResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .read()?
            .role_domains
            .iter()
            .filter(|rd| rd.tenant_name == tenant && rd.role_name == role)
            .map(|rd| rd.domain_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn domain_capability_names(
        &self,
        tenant: &str,
        domain: &str,
    ) -> QuiverResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .read()?
            .domain_capabilities
            .iter()
            .filter(|dc| dc.tenant_name == tenant && dc.domain_name == domain)
            .map(|dc| dc.capability_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn tool_ids_via_capability_tools(
        &self,
        tenant: &str,
        capabilities: &[String],
    ) -> QuiverResult<HashSet<ToolId>> {
        Ok(self
            .read()?
            .capability_tools
            .iter()
            .filter(|ct| ct.tenant_name == tenant && capabilities.contains(&ct.capability_name))
            .map(|ct| ct.tool_id)
            .collect())
    }

    async fn tool_ids_via_capability_skills(
        &self,
        tenant: &str,
        capabilities: &[String],
        skills: Option<&[String]>,
    ) -> QuiverResult<HashSet<ToolId>> {
        let t = self.read()?;
        let skill_names: HashSet<&str> = t
            .capability_skills
            .iter()
            .filter(|cs| cs.tenant_name == tenant && capabilities.contains(&cs.capability_name))
            .filter(|cs| skills.map_or(true, |wanted| wanted.contains(&cs.skill_name)))
            .map(|cs| cs.skill_name.as_str())
            .collect();
        Ok(t.tool_skills
            .iter()
            .filter(|ts| ts.tenant_name == tenant && skill_names.contains(ts.skill_name.as_str()))
            .map(|ts| ts.tool_id)
            .collect())
    }

    async fn tool_capability_names(
        &self,
        tenant: &str,
        tool_id: ToolId,
    ) -> QuiverResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .read()?
            .capability_tools
            .iter()
            .filter(|ct| ct.tenant_name == tenant && ct.tool_id == tool_id)
            .map(|ct| ct.capability_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    // === Tool search ===

    async fn system_tools(&self, tenant: &str) -> QuiverResult<Vec<Tool>> {
        Ok(self
            .read()?
            .tools
            .values()
            .filter(|t| t.tenant == tenant && t.tool_type.is_system())
            .cloned()
            .collect())
    }

    async fn general_tools(
        &self,
        tenant: &str,
        ids: Option<&HashSet<ToolId>>,
    ) -> QuiverResult<Vec<Tool>> {
        Ok(self
            .read()?
            .tools
            .values()
            .filter(|t| t.tenant == tenant && !t.tool_type.is_system())
            .filter(|t| ids.map_or(true, |ids| ids.contains(&t.id)))
            .cloned()
            .collect())
    }

    async fn nearest_general_tools(
        &self,
        tenant: &str,
        query: &EmbeddingVector,
        ids: Option<&HashSet<ToolId>>,
        k: usize,
    ) -> QuiverResult<Vec<RankedTool>> {
        let t = self.read()?;
        let mut ranked = Vec::new();
        for tool in t
            .tools
            .values()
            .filter(|t| t.tenant == tenant && !t.tool_type.is_system())
            .filter(|t| ids.map_or(true, |ids| ids.contains(&t.id)))
        {
            // Vectors from another model size are not comparable.
            let Some(embedding) = tool
                .embedding
                .as_ref()
                .filter(|e| e.data.len() == query.data.len())
            else {
                continue;
            };
            ranked.push(RankedTool {
                distance: query.cosine_distance(embedding)?,
                tool: tool.clone(),
            });
        }
        ranked.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.tool.name.cmp(&b.tool.name))
        });
        ranked.truncate(k);
        Ok(ranked)
    }
}

// ============================================================================
// TESTS
// ============================================================================
