//! PostgreSQL/pgvector implementation of `EntityStore`.
//!
//! Multi-row writes (skill ingest, tool delete, workflow upsert, tool
//! upsert) run in one transaction. Cascades ride on the foreign keys in
//! `sql/quiver_init.sql`. Vectors travel as text and are cast with
//! `::text::vector`; nearest-neighbour search orders by pgvector's `<=>`
//! cosine distance.

use crate::config::DbConfig;
use crate::error::{column, db_error, pool_error, transaction_error};
use crate::rows::{
    capability_from_row, domain_from_row, optional_vector_literal, skill_from_row,
    tool_from_row, vector_literal, CAPABILITY_COLUMNS, DOMAIN_COLUMNS, SKILL_COLUMNS,
    TOOL_COLUMNS,
};
use ::async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use quiver_core::{
    Agent, ApplicationTool, Capability, CapabilitySkill, CapabilityTool, ChainLink, Domain,
    DomainCapability, EmbeddingVector, EntityType, QuiverError, QuiverResult, Role, RoleAgent,
    RoleDomain, RoleUser, Skill, StorageError, Tenant, Tool, ToolChain, ToolId, ToolRel,
    ToolSkill, User, UserAgent, ValidationError, Workflow, WorkflowStep,
};
use quiver_storage::{EntityStore, RankedTool, SkillIngest, SkillIngestOutcome, ToolDeletion};
use std::collections::{BTreeMap, HashSet};
use tokio_postgres::types::ToSql;

const SCHEMA_SQL: &str = include_str!("../sql/quiver_init.sql");

const ENSURE_TENANT: &str =
    "INSERT INTO quiver_tenant (name) VALUES ($1) ON CONFLICT (name) DO NOTHING";

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// Entity store over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> QuiverResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create every table and index that does not exist yet.
    pub async fn migrate(&self) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(db_error)?;
        tracing::info!("Quiver schema ready");
        Ok(())
    }

    async fn conn(&self) -> QuiverResult<Object> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Run `insert` only when `check` (a single `ok` boolean) holds. Both
    /// statements take the same parameters.
    async fn insert_if(&self, check: &str, insert: &str, params: Params<'_>) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let row = conn.query_one(check, params).await.map_err(db_error)?;
        let ok: bool = column(&row, "ok")?;
        if !ok {
            return Ok(false);
        }
        conn.execute(insert, params).await.map_err(db_error)?;
        Ok(true)
    }

    async fn names(&self, sql: &str, params: Params<'_>) -> QuiverResult<Vec<String>> {
        let conn = self.conn().await?;
        let rows = conn.query(sql, params).await.map_err(db_error)?;
        rows.iter().map(|r| column(r, "name")).collect()
    }

    async fn tool_ids(&self, sql: &str, params: Params<'_>) -> QuiverResult<HashSet<ToolId>> {
        let conn = self.conn().await?;
        let rows = conn.query(sql, params).await.map_err(db_error)?;
        rows.iter().map(|r| column(r, "tool_id")).collect()
    }

    async fn tools(&self, sql: &str, params: Params<'_>) -> QuiverResult<Vec<Tool>> {
        let conn = self.conn().await?;
        let rows = conn.query(sql, params).await.map_err(db_error)?;
        rows.iter().map(tool_from_row).collect()
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool_size", &self.pool.status().size)
            .finish()
    }
}

#[async_trait]
impl EntityStore for PgStore {
    // ========================================================================
    // TENANT AND IAM
    // ========================================================================

    async fn tenant_upsert(&self, tenant: &Tenant) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO quiver_tenant (name, created_at) VALUES ($1, $2)
             ON CONFLICT (name) DO NOTHING",
            &[&tenant.name, &tenant.created_at],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn tenant_list(&self) -> QuiverResult<Vec<String>> {
        self.names("SELECT name FROM quiver_tenant ORDER BY name", &[])
            .await
    }

    async fn role_upsert(&self, role: &Role) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(ENSURE_TENANT, &[&role.tenant_name])
            .await
            .map_err(db_error)?;
        conn.execute(
            "INSERT INTO quiver_role (tenant_name, name, role_type) VALUES ($1, $2, $3)
             ON CONFLICT (tenant_name, name) DO UPDATE SET role_type = EXCLUDED.role_type",
            &[&role.tenant_name, &role.name, &role.role_type],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn user_upsert(&self, user: &User) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(ENSURE_TENANT, &[&user.tenant_name])
            .await
            .map_err(db_error)?;
        conn.execute(
            "INSERT INTO quiver_user (tenant_name, user_id, email) VALUES ($1, $2, $3)
             ON CONFLICT (tenant_name, user_id) DO UPDATE SET email = EXCLUDED.email",
            &[&user.tenant_name, &user.user_id, &user.email],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn agent_upsert(&self, agent: &Agent) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(ENSURE_TENANT, &[&agent.tenant_name])
            .await
            .map_err(db_error)?;
        conn.execute(
            "INSERT INTO quiver_agent (tenant_name, agent_id, name, description)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (tenant_name, agent_id)
             DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
            &[&agent.tenant_name, &agent.agent_id, &agent.name, &agent.description],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn role_domain_link(&self, link: &RoleDomain) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_role WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_domain WHERE tenant_name = $1 AND name = $3) AS ok",
            "INSERT INTO quiver_role_domain (tenant_name, role_name, domain_name)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.role_name, &link.domain_name],
        )
        .await
    }

    async fn role_agent_link(&self, link: &RoleAgent) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_role WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_agent WHERE tenant_name = $1 AND agent_id = $3) AS ok",
            "INSERT INTO quiver_role_agent (tenant_name, role_name, agent_id)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.role_name, &link.agent_id],
        )
        .await
    }

    async fn role_user_link(&self, link: &RoleUser) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_role WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_user WHERE tenant_name = $1 AND user_id = $3) AS ok",
            "INSERT INTO quiver_role_user (tenant_name, role_name, user_id)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.role_name, &link.user_id],
        )
        .await
    }

    async fn user_agent_link(&self, link: &UserAgent) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_user WHERE tenant_name = $1 AND user_id = $2)
                AND EXISTS (SELECT 1 FROM quiver_agent WHERE tenant_name = $1 AND agent_id = $3) AS ok",
            "INSERT INTO quiver_user_agent (tenant_name, user_id, agent_id)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.user_id, &link.agent_id],
        )
        .await
    }

    // ========================================================================
    // DOMAINS AND CAPABILITIES
    // ========================================================================

    async fn domain_upsert(&self, domain: &Domain) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(ENSURE_TENANT, &[&domain.tenant_name])
            .await
            .map_err(db_error)?;
        let embedding = optional_vector_literal(&domain.embedding);
        let model = domain.embedding.as_ref().map(|e| e.model_id.clone());
        conn.execute(
            "INSERT INTO quiver_domain (tenant_name, name, label, description, scope,
                 domain_entities, domain_purposes, value_metrics, embedding, embedding_model,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::text::vector, $10, $11, now())
             ON CONFLICT (tenant_name, name) DO UPDATE SET
                 label = EXCLUDED.label,
                 description = EXCLUDED.description,
                 scope = EXCLUDED.scope,
                 domain_entities = EXCLUDED.domain_entities,
                 domain_purposes = EXCLUDED.domain_purposes,
                 value_metrics = EXCLUDED.value_metrics,
                 embedding = EXCLUDED.embedding,
                 embedding_model = EXCLUDED.embedding_model,
                 updated_at = now()",
            &[
                &domain.tenant_name,
                &domain.name,
                &domain.label,
                &domain.description,
                &domain.scope,
                &domain.domain_entities,
                &domain.domain_purposes,
                &domain.value_metrics,
                &embedding,
                &model,
                &domain.created_at,
            ],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn domain_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Domain>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_domain WHERE tenant_name = $1 AND name = $2",
            DOMAIN_COLUMNS
        );
        let row = conn.query_opt(&sql, &[&tenant, &name]).await.map_err(db_error)?;
        row.as_ref().map(domain_from_row).transpose()
    }

    async fn domain_list(&self, tenant: &str) -> QuiverResult<Vec<Domain>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_domain WHERE tenant_name = $1 ORDER BY name",
            DOMAIN_COLUMNS
        );
        let rows = conn.query(&sql, &[&tenant]).await.map_err(db_error)?;
        rows.iter().map(domain_from_row).collect()
    }

    async fn domain_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM quiver_domain WHERE tenant_name = $1 AND name = $2",
                &[&tenant, &name],
            )
            .await
            .map_err(db_error)?;
        Ok(deleted > 0)
    }

    async fn capability_upsert(&self, capability: &Capability) -> QuiverResult<()> {
        let conn = self.conn().await?;
        conn.execute(ENSURE_TENANT, &[&capability.tenant_name])
            .await
            .map_err(db_error)?;
        let embedding = optional_vector_literal(&capability.embedding);
        let model = capability.embedding.as_ref().map(|e| e.model_id.clone());
        conn.execute(
            "INSERT INTO quiver_capability (tenant_name, name, label, description,
                 business_context, business_processes, outcome, business_intent, embedding,
                 embedding_model, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::text::vector, $10, $11, now())
             ON CONFLICT (tenant_name, name) DO UPDATE SET
                 label = EXCLUDED.label,
                 description = EXCLUDED.description,
                 business_context = EXCLUDED.business_context,
                 business_processes = EXCLUDED.business_processes,
                 outcome = EXCLUDED.outcome,
                 business_intent = EXCLUDED.business_intent,
                 embedding = EXCLUDED.embedding,
                 embedding_model = EXCLUDED.embedding_model,
                 updated_at = now()",
            &[
                &capability.tenant_name,
                &capability.name,
                &capability.label,
                &capability.description,
                &capability.business_context,
                &capability.business_processes,
                &capability.outcome,
                &capability.business_intent,
                &embedding,
                &model,
                &capability.created_at,
            ],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn capability_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Capability>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_capability WHERE tenant_name = $1 AND name = $2",
            CAPABILITY_COLUMNS
        );
        let row = conn.query_opt(&sql, &[&tenant, &name]).await.map_err(db_error)?;
        row.as_ref().map(capability_from_row).transpose()
    }

    async fn capability_list(&self, tenant: &str) -> QuiverResult<Vec<Capability>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_capability WHERE tenant_name = $1 ORDER BY name",
            CAPABILITY_COLUMNS
        );
        let rows = conn.query(&sql, &[&tenant]).await.map_err(db_error)?;
        rows.iter().map(capability_from_row).collect()
    }

    async fn capability_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM quiver_capability WHERE tenant_name = $1 AND name = $2",
                &[&tenant, &name],
            )
            .await
            .map_err(db_error)?;
        Ok(deleted > 0)
    }

    async fn domain_capability_link(&self, link: &DomainCapability) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_domain WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_capability WHERE tenant_name = $1 AND name = $3) AS ok",
            "INSERT INTO quiver_domain_capability (tenant_name, domain_name, capability_name)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.domain_name, &link.capability_name],
        )
        .await
    }

    async fn domain_capability_list(&self, tenant: &str) -> QuiverResult<Vec<DomainCapability>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_name, domain_name, capability_name FROM quiver_domain_capability
                 WHERE tenant_name = $1 ORDER BY domain_name, capability_name",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                Ok(DomainCapability {
                    tenant_name: column(r, "tenant_name")?,
                    domain_name: column(r, "domain_name")?,
                    capability_name: column(r, "capability_name")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // SKILLS
    // ========================================================================

    async fn skill_get(&self, tenant: &str, name: &str) -> QuiverResult<Option<Skill>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_skill WHERE tenant_name = $1 AND name = $2",
            SKILL_COLUMNS
        );
        let row = conn.query_opt(&sql, &[&tenant, &name]).await.map_err(db_error)?;
        row.as_ref().map(skill_from_row).transpose()
    }

    async fn skill_list(&self, tenant: &str) -> QuiverResult<Vec<Skill>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM quiver_skill WHERE tenant_name = $1 ORDER BY name",
            SKILL_COLUMNS
        );
        let rows = conn.query(&sql, &[&tenant]).await.map_err(db_error)?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn skill_ingest(&self, ingest: &SkillIngest) -> QuiverResult<SkillIngestOutcome> {
        let skill = &ingest.skill;
        let tenant = &skill.tenant_name;
        let wanted: Vec<ToolId> = ingest
            .steps
            .iter()
            .map(|s| s.tool_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(transaction_error)?;

        let found = tx
            .query(
                "SELECT id FROM quiver_tool WHERE tenant_name = $1 AND id = ANY($2)",
                &[tenant, &wanted],
            )
            .await
            .map_err(db_error)?;
        if found.len() != wanted.len() {
            let present: HashSet<ToolId> = found
                .iter()
                .map(|r| column(r, "id"))
                .collect::<QuiverResult<_>>()?;
            let missing = wanted
                .iter()
                .find(|id| !present.contains(id))
                .map(|id| id.to_string())
                .unwrap_or_default();
            return Err(QuiverError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Skill,
                reason: format!("tool {} is not registered in tenant '{}'", missing, tenant),
            }));
        }

        tx.execute(ENSURE_TENANT, &[tenant]).await.map_err(db_error)?;

        let created = tx
            .query_opt(
                "SELECT 1 FROM quiver_skill WHERE tenant_name = $1 AND name = $2",
                &[tenant, &skill.name],
            )
            .await
            .map_err(db_error)?
            .is_none();

        let previous = tx
            .query(
                "SELECT tool_id FROM quiver_tool_skill WHERE tenant_name = $1 AND skill_name = $2
                 ORDER BY step_index, tool_id",
                &[tenant, &skill.name],
            )
            .await
            .map_err(db_error)?;
        let previous_tool_ids = previous
            .iter()
            .map(|r| column(r, "tool_id"))
            .collect::<QuiverResult<Vec<ToolId>>>()?;

        let procedures = serde_json::to_value(&skill.operational_procedures).map_err(|e| {
            QuiverError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Skill,
                reason: e.to_string(),
            })
        })?;
        let embedding = optional_vector_literal(&skill.embedding);
        let model = skill.embedding.as_ref().map(|e| e.model_id.clone());
        tx.execute(
            "INSERT INTO quiver_skill (tenant_name, name, label, description,
                 operational_entities, operational_procedures, operational_intent, preconditions,
                 postconditions, proficiency, embedding, embedding_model, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::text::vector, $12, $13, now())
             ON CONFLICT (tenant_name, name) DO UPDATE SET
                 label = EXCLUDED.label,
                 description = EXCLUDED.description,
                 operational_entities = EXCLUDED.operational_entities,
                 operational_procedures = EXCLUDED.operational_procedures,
                 operational_intent = EXCLUDED.operational_intent,
                 preconditions = EXCLUDED.preconditions,
                 postconditions = EXCLUDED.postconditions,
                 proficiency = EXCLUDED.proficiency,
                 embedding = EXCLUDED.embedding,
                 embedding_model = EXCLUDED.embedding_model,
                 updated_at = now()",
            &[
                tenant,
                &skill.name,
                &skill.label,
                &skill.description,
                &skill.operational_entities,
                &procedures,
                &skill.operational_intent,
                &skill.preconditions,
                &skill.postconditions,
                &skill.proficiency,
                &embedding,
                &model,
                &skill.created_at,
            ],
        )
        .await
        .map_err(db_error)?;

        tx.execute(
            "DELETE FROM quiver_tool_skill WHERE tenant_name = $1 AND skill_name = $2",
            &[tenant, &skill.name],
        )
        .await
        .map_err(db_error)?;
        for step in &ingest.steps {
            tx.execute(
                "INSERT INTO quiver_tool_skill (tenant_name, tool_id, skill_name, step_index, step_intent)
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
                &[tenant, &step.tool_id, &skill.name, &step.step_index, &step.step_intent],
            )
            .await
            .map_err(db_error)?;
        }

        let mut outcome = SkillIngestOutcome {
            created,
            previous_tool_ids,
            ..Default::default()
        };
        for capability in &ingest.capabilities {
            let linked = tx
                .query_opt(
                    "INSERT INTO quiver_capability_skill (tenant_name, capability_name, skill_name)
                     SELECT $1, $2, $3::text
                     WHERE EXISTS (SELECT 1 FROM quiver_capability WHERE tenant_name = $1 AND name = $2)
                     ON CONFLICT (tenant_name, capability_name, skill_name)
                     DO UPDATE SET skill_name = EXCLUDED.skill_name
                     RETURNING capability_name",
                    &[tenant, capability, &skill.name],
                )
                .await
                .map_err(db_error)?;
            if linked.is_some() {
                outcome.linked_capabilities.push(capability.clone());
            } else {
                outcome.skipped_capabilities.push(capability.clone());
            }
        }

        tx.commit().await.map_err(transaction_error)?;
        Ok(outcome)
    }

    async fn skill_find_by_tool_chain(
        &self,
        tenant: &str,
        chain: &ToolChain,
    ) -> QuiverResult<Option<Skill>> {
        if chain.is_empty() {
            return Ok(None);
        }
        let ids = chain.tool_ids();
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT skill_name, tool_id, step_index FROM quiver_tool_skill
                 WHERE tenant_name = $1 AND skill_name IN (
                     SELECT skill_name FROM quiver_tool_skill
                     WHERE tenant_name = $1 AND tool_id = ANY($2))",
                &[&tenant, &ids],
            )
            .await
            .map_err(db_error)?;

        let mut links: BTreeMap<String, Vec<ChainLink>> = BTreeMap::new();
        for row in &rows {
            links
                .entry(column(row, "skill_name")?)
                .or_default()
                .push(ChainLink {
                    step_index: column(row, "step_index")?,
                    tool_id: column(row, "tool_id")?,
                });
        }
        let matched = links
            .into_iter()
            .find(|(_, l)| ToolChain::new(l.iter().copied()) == *chain)
            .map(|(name, _)| name);
        drop(conn);

        match matched {
            Some(name) => self.skill_get(tenant, &name).await,
            None => Ok(None),
        }
    }

    async fn skill_delete(&self, tenant: &str, name: &str) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM quiver_skill WHERE tenant_name = $1 AND name = $2",
                &[&tenant, &name],
            )
            .await
            .map_err(db_error)?;
        Ok(deleted > 0)
    }

    async fn capability_skill_link(&self, link: &CapabilitySkill) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_capability WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_skill WHERE tenant_name = $1 AND name = $3) AS ok",
            "INSERT INTO quiver_capability_skill (tenant_name, capability_name, skill_name)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.capability_name, &link.skill_name],
        )
        .await
    }

    async fn capability_skill_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilitySkill>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_name, capability_name, skill_name FROM quiver_capability_skill
                 WHERE tenant_name = $1 ORDER BY capability_name, skill_name",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                Ok(CapabilitySkill {
                    tenant_name: column(r, "tenant_name")?,
                    capability_name: column(r, "capability_name")?,
                    skill_name: column(r, "skill_name")?,
                })
            })
            .collect()
    }

    async fn tool_skill_list(&self, tenant: &str) -> QuiverResult<Vec<ToolSkill>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_name, tool_id, skill_name, step_index, step_intent
                 FROM quiver_tool_skill WHERE tenant_name = $1
                 ORDER BY skill_name, step_index",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                Ok(ToolSkill {
                    tenant_name: column(r, "tenant_name")?,
                    tool_id: column(r, "tool_id")?,
                    skill_name: column(r, "skill_name")?,
                    step_index: column(r, "step_index")?,
                    step_intent: column(r, "step_intent")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // TOOLS
    // ========================================================================

    async fn tool_upsert(&self, tool: &Tool) -> QuiverResult<Tool> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(transaction_error)?;

        if let Some(row) = tx
            .query_opt(
                "SELECT id FROM quiver_tool WHERE tenant_name = $1 AND name = $2 AND id <> $3",
                &[&tool.tenant, &tool.name, &tool.id],
            )
            .await
            .map_err(db_error)?
        {
            return Err(QuiverError::Storage(StorageError::DuplicateTool {
                name: tool.name.clone(),
                tenant: tool.tenant.clone(),
                existing_id: column(&row, "id")?,
            }));
        }

        if let Some(row) = tx
            .query_opt("SELECT tenant_name FROM quiver_tool WHERE id = $1", &[&tool.id])
            .await
            .map_err(db_error)?
        {
            let actual: String = column(&row, "tenant_name")?;
            if actual != tool.tenant {
                return Err(QuiverError::Validation(ValidationError::TenantMismatch {
                    entity_type: EntityType::Tool,
                    key: tool.id.to_string(),
                    expected: tool.tenant.clone(),
                    actual,
                }));
            }
        }

        tx.execute(ENSURE_TENANT, &[&tool.tenant])
            .await
            .map_err(db_error)?;
        let embedding = optional_vector_literal(&tool.embedding);
        let model = tool.embedding.as_ref().map(|e| e.model_id.clone());
        let sql = format!(
            "INSERT INTO quiver_tool (id, tenant_name, name, description, embedding,
                 embedding_model, document, canonical_data, tool_type, app_name,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5::text::vector, $6, $7, $8, $9, $10, $11, now())
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name,
                 description = EXCLUDED.description,
                 embedding = EXCLUDED.embedding,
                 embedding_model = EXCLUDED.embedding_model,
                 document = EXCLUDED.document,
                 canonical_data = EXCLUDED.canonical_data,
                 tool_type = EXCLUDED.tool_type,
                 app_name = EXCLUDED.app_name,
                 updated_at = now()
             RETURNING {}",
            TOOL_COLUMNS
        );
        let row = tx
            .query_one(
                &sql,
                &[
                    &tool.id,
                    &tool.tenant,
                    &tool.name,
                    &tool.description,
                    &embedding,
                    &model,
                    &tool.document,
                    &tool.canonical_data,
                    &tool.tool_type.as_db_str(),
                    &tool.app_name,
                    &tool.created_at,
                ],
            )
            .await
            .map_err(db_error)?;
        let stored = tool_from_row(&row)?;
        tx.commit().await.map_err(transaction_error)?;
        Ok(stored)
    }

    async fn tool_get(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<Tool>> {
        let sql = format!(
            "SELECT {} FROM quiver_tool WHERE tenant_name = $1 AND id = $2",
            TOOL_COLUMNS
        );
        Ok(self.tools(&sql, &[&tenant, &id]).await?.into_iter().next())
    }

    async fn tool_get_by_name(&self, tenant: &str, name: &str) -> QuiverResult<Option<Tool>> {
        let sql = format!(
            "SELECT {} FROM quiver_tool WHERE tenant_name = $1 AND name = $2",
            TOOL_COLUMNS
        );
        Ok(self.tools(&sql, &[&tenant, &name]).await?.into_iter().next())
    }

    async fn tool_list(&self, tenant: &str) -> QuiverResult<Vec<Tool>> {
        let sql = format!(
            "SELECT {} FROM quiver_tool WHERE tenant_name = $1 ORDER BY name",
            TOOL_COLUMNS
        );
        self.tools(&sql, &[&tenant]).await
    }

    async fn tool_delete(&self, tenant: &str, id: ToolId) -> QuiverResult<Option<ToolDeletion>> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(transaction_error)?;

        let sql = format!(
            "SELECT {} FROM quiver_tool WHERE tenant_name = $1 AND id = $2 FOR UPDATE",
            TOOL_COLUMNS
        );
        let Some(row) = tx.query_opt(&sql, &[&tenant, &id]).await.map_err(db_error)? else {
            return Ok(None);
        };
        let tool = tool_from_row(&row)?;

        let using = tx
            .query(
                "SELECT DISTINCT ts.skill_name,
                        EXISTS (SELECT 1 FROM quiver_tool_skill o
                                WHERE o.tenant_name = ts.tenant_name
                                  AND o.skill_name = ts.skill_name
                                  AND o.tool_id <> ts.tool_id) AS shared
                 FROM quiver_tool_skill ts
                 WHERE ts.tenant_name = $1 AND ts.tool_id = $2
                 ORDER BY ts.skill_name",
                &[&tenant, &id],
            )
            .await
            .map_err(db_error)?;

        let mut removed_skills = Vec::new();
        let mut trimmed_skills = Vec::new();
        for row in &using {
            let name: String = column(row, "skill_name")?;
            let shared: bool = column(row, "shared")?;
            if shared {
                trimmed_skills.push(name);
            } else {
                removed_skills.push(name);
            }
        }

        if !removed_skills.is_empty() {
            tx.execute(
                "DELETE FROM quiver_skill WHERE tenant_name = $1 AND name = ANY($2)",
                &[&tenant, &removed_skills],
            )
            .await
            .map_err(db_error)?;
        }
        tx.execute("DELETE FROM quiver_tool WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(transaction_error)?;

        Ok(Some(ToolDeletion {
            tool,
            removed_skills,
            trimmed_skills,
        }))
    }

    async fn capability_tool_link(&self, link: &CapabilityTool) -> QuiverResult<bool> {
        self.insert_if(
            "SELECT EXISTS (SELECT 1 FROM quiver_capability WHERE tenant_name = $1 AND name = $2)
                AND EXISTS (SELECT 1 FROM quiver_tool WHERE tenant_name = $1 AND id = $3) AS ok",
            "INSERT INTO quiver_capability_tool (tenant_name, capability_name, tool_id)
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[&link.tenant_name, &link.capability_name, &link.tool_id],
        )
        .await
    }

    async fn capability_tool_list(&self, tenant: &str) -> QuiverResult<Vec<CapabilityTool>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_name, capability_name, tool_id FROM quiver_capability_tool
                 WHERE tenant_name = $1 ORDER BY capability_name, tool_id",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                Ok(CapabilityTool {
                    tenant_name: column(r, "tenant_name")?,
                    capability_name: column(r, "capability_name")?,
                    tool_id: column(r, "tool_id")?,
                })
            })
            .collect()
    }

    async fn application_tool_link(&self, link: &ApplicationTool) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let inserted = conn
            .execute(
                "INSERT INTO quiver_application_tool (tenant_name, application_name, tool_id)
                 SELECT $1, $2::text, $3
                 WHERE EXISTS (SELECT 1 FROM quiver_tool WHERE tenant_name = $1 AND id = $3)
                 ON CONFLICT DO NOTHING",
                &[&link.tenant_name, &link.application_name, &link.tool_id],
            )
            .await
            .map_err(db_error)?;
        if inserted > 0 {
            return Ok(true);
        }
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM quiver_tool WHERE tenant_name = $1 AND id = $2) AS ok",
                &[&link.tenant_name, &link.tool_id],
            )
            .await
            .map_err(db_error)?;
        column(&row, "ok")
    }

    async fn tool_rel_upsert(&self, rel: &ToolRel) -> QuiverResult<bool> {
        let conn = self.conn().await?;
        let written = conn
            .execute(
                "INSERT INTO quiver_tool_rel (tenant_name, source_tool_id, target_tool_id,
                     composite_intent, field_mapping)
                 SELECT $1, $2, $3, $4::text, $5::jsonb
                 WHERE EXISTS (SELECT 1 FROM quiver_tool WHERE tenant_name = $1 AND id = $2)
                   AND EXISTS (SELECT 1 FROM quiver_tool WHERE tenant_name = $1 AND id = $3)
                 ON CONFLICT (tenant_name, source_tool_id, target_tool_id) DO UPDATE SET
                     composite_intent = EXCLUDED.composite_intent,
                     field_mapping = EXCLUDED.field_mapping",
                &[
                    &rel.tenant_name,
                    &rel.source_tool_id,
                    &rel.target_tool_id,
                    &rel.composite_intent,
                    &rel.field_mapping,
                ],
            )
            .await
            .map_err(db_error)?;
        Ok(written > 0)
    }

    async fn tool_rel_list(&self, tenant: &str) -> QuiverResult<Vec<ToolRel>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_name, source_tool_id, target_tool_id, composite_intent, field_mapping
                 FROM quiver_tool_rel WHERE tenant_name = $1
                 ORDER BY source_tool_id, target_tool_id",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                Ok(ToolRel {
                    tenant_name: column(r, "tenant_name")?,
                    source_tool_id: column(r, "source_tool_id")?,
                    target_tool_id: column(r, "target_tool_id")?,
                    composite_intent: column(r, "composite_intent")?,
                    field_mapping: column(r, "field_mapping")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // WORKFLOWS
    // ========================================================================

    async fn workflow_upsert(&self, workflow: &Workflow) -> QuiverResult<Workflow> {
        let tenant = &workflow.tenant_name;
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(transaction_error)?;

        tx.execute(ENSURE_TENANT, &[tenant]).await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO quiver_workflow (tenant_name, name, label, description, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, now())
                 ON CONFLICT (tenant_name, name) DO UPDATE SET
                     label = EXCLUDED.label,
                     description = EXCLUDED.description,
                     updated_at = now()
                 RETURNING created_at, updated_at",
                &[
                    tenant,
                    &workflow.name,
                    &workflow.label,
                    &workflow.description,
                    &workflow.created_at,
                ],
            )
            .await
            .map_err(db_error)?;

        let mut stored = workflow.clone();
        stored.created_at = column(&row, "created_at")?;
        stored.updated_at = column(&row, "updated_at")?;
        stored.steps.sort_by_key(|s| s.step_index);

        tx.execute(
            "DELETE FROM quiver_workflow_step WHERE tenant_name = $1 AND workflow_name = $2",
            &[tenant, &workflow.name],
        )
        .await
        .map_err(db_error)?;

        for step in &mut stored.steps {
            tx.execute(
                "INSERT INTO quiver_workflow_step (tenant_name, workflow_name, step_index, name, intent)
                 VALUES ($1, $2, $3, $4, $5)",
                &[tenant, &workflow.name, &step.step_index, &step.name, &step.intent],
            )
            .await
            .map_err(db_error)?;

            let mut kept = Vec::new();
            for domain in &step.domains {
                let inserted = tx
                    .query_opt(
                        "INSERT INTO quiver_workflow_step_domain
                             (tenant_name, workflow_name, step_index, domain_name)
                         SELECT $1, $2::text, $3::int4, $4
                         WHERE EXISTS (SELECT 1 FROM quiver_domain WHERE tenant_name = $1 AND name = $4)
                         ON CONFLICT DO NOTHING
                         RETURNING domain_name",
                        &[tenant, &workflow.name, &step.step_index, domain],
                    )
                    .await
                    .map_err(db_error)?;
                if inserted.is_some() {
                    kept.push(domain.clone());
                }
            }
            step.domains = kept;

            let mut kept = Vec::new();
            for capability in &step.capabilities {
                let inserted = tx
                    .query_opt(
                        "INSERT INTO quiver_workflow_step_capability
                             (tenant_name, workflow_name, step_index, capability_name)
                         SELECT $1, $2::text, $3::int4, $4
                         WHERE EXISTS (SELECT 1 FROM quiver_capability WHERE tenant_name = $1 AND name = $4)
                         ON CONFLICT DO NOTHING
                         RETURNING capability_name",
                        &[tenant, &workflow.name, &step.step_index, capability],
                    )
                    .await
                    .map_err(db_error)?;
                if inserted.is_some() {
                    kept.push(capability.clone());
                }
            }
            step.capabilities = kept;
        }

        tx.commit().await.map_err(transaction_error)?;
        Ok(stored)
    }

    async fn workflow_list(&self, tenant: &str) -> QuiverResult<Vec<Workflow>> {
        let conn = self.conn().await?;
        let workflow_rows = conn
            .query(
                "SELECT tenant_name, name, label, description, created_at, updated_at
                 FROM quiver_workflow WHERE tenant_name = $1 ORDER BY name",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        let step_rows = conn
            .query(
                "SELECT workflow_name, step_index, name, intent FROM quiver_workflow_step
                 WHERE tenant_name = $1 ORDER BY workflow_name, step_index",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        let domain_rows = conn
            .query(
                "SELECT workflow_name, step_index, domain_name AS link FROM quiver_workflow_step_domain
                 WHERE tenant_name = $1 ORDER BY domain_name",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;
        let capability_rows = conn
            .query(
                "SELECT workflow_name, step_index, capability_name AS link
                 FROM quiver_workflow_step_capability
                 WHERE tenant_name = $1 ORDER BY capability_name",
                &[&tenant],
            )
            .await
            .map_err(db_error)?;

        let mut steps: BTreeMap<(String, i32), WorkflowStep> = BTreeMap::new();
        for r in &step_rows {
            let step_index: i32 = column(r, "step_index")?;
            steps.insert(
                (column(r, "workflow_name")?, step_index),
                WorkflowStep {
                    step_index,
                    name: column(r, "name")?,
                    intent: column(r, "intent")?,
                    domains: Vec::new(),
                    capabilities: Vec::new(),
                },
            );
        }
        for (rows, is_domain) in [(&domain_rows, true), (&capability_rows, false)] {
            for r in rows.iter() {
                let k: (String, i32) = (column(r, "workflow_name")?, column(r, "step_index")?);
                if let Some(step) = steps.get_mut(&k) {
                    let link: String = column(r, "link")?;
                    if is_domain {
                        step.domains.push(link);
                    } else {
                        step.capabilities.push(link);
                    }
                }
            }
        }

        workflow_rows
            .iter()
            .map(|r| {
                let name: String = column(r, "name")?;
                let own_steps = steps
                    .range((name.clone(), i32::MIN)..=(name.clone(), i32::MAX))
                    .map(|(_, s)| s.clone())
                    .collect();
                Ok(Workflow {
                    tenant_name: column(r, "tenant_name")?,
                    label: column(r, "label")?,
                    description: column(r, "description")?,
                    steps: own_steps,
                    created_at: column(r, "created_at")?,
                    updated_at: column(r, "updated_at")?,
                    name,
                })
            })
            .collect()
    }

    // ========================================================================
    // RESOLVER JOIN PATHS
    // ========================================================================

    async fn agent_role_names(&self, tenant: &str, agent_id: &str) -> QuiverResult<Vec<String>> {
        self.names(
            "SELECT DISTINCT role_name AS name FROM quiver_role_agent
             WHERE tenant_name = $1 AND agent_id = $2 ORDER BY name",
            &[&tenant, &agent_id],
        )
        .await
    }

    async fn role_domain_names(&self, tenant: &str, role: &str) -> QuiverResult<Vec<String>> {
        self.names(
            "SELECT DISTINCT domain_name AS name FROM quiver_role_domain
             WHERE tenant_name = $1 AND role_name = $2 ORDER BY name",
            &[&tenant, &role],
        )
        .await
    }

    async fn domain_capability_names(
        &self,
        tenant: &str,
        domain: &str,
    ) -> QuiverResult<Vec<String>> {
        self.names(
            "SELECT DISTINCT capability_name AS name FROM quiver_domain_capability
             WHERE tenant_name = $1 AND domain_name = $2 ORDER BY name",
            &[&tenant, &domain],
        )
        .await
    }

    async fn tool_ids_via_capability_tools(
        &self,
        tenant: &str,
        capabilities: &[String],
    ) -> QuiverResult<HashSet<ToolId>> {
        let capabilities = capabilities.to_vec();
        self.tool_ids(
            "SELECT DISTINCT tool_id FROM quiver_capability_tool
             WHERE tenant_name = $1 AND capability_name = ANY($2)",
            &[&tenant, &capabilities],
        )
        .await
    }

    async fn tool_ids_via_capability_skills(
        &self,
        tenant: &str,
        capabilities: &[String],
        skills: Option<&[String]>,
    ) -> QuiverResult<HashSet<ToolId>> {
        let capabilities = capabilities.to_vec();
        let skills: Option<Vec<String>> = skills.map(<[String]>::to_vec);
        self.tool_ids(
            "SELECT DISTINCT ts.tool_id FROM quiver_capability_skill cs
             JOIN quiver_tool_skill ts
               ON ts.tenant_name = cs.tenant_name AND ts.skill_name = cs.skill_name
             WHERE cs.tenant_name = $1
               AND cs.capability_name = ANY($2)
               AND ($3::text[] IS NULL OR cs.skill_name = ANY($3))",
            &[&tenant, &capabilities, &skills],
        )
        .await
    }

    async fn tool_capability_names(
        &self,
        tenant: &str,
        tool_id: ToolId,
    ) -> QuiverResult<Vec<String>> {
        self.names(
            "SELECT DISTINCT capability_name AS name FROM quiver_capability_tool
             WHERE tenant_name = $1 AND tool_id = $2 ORDER BY name",
            &[&tenant, &tool_id],
        )
        .await
    }

    // ========================================================================
    // TOOL SEARCH
    // ========================================================================

    async fn system_tools(&self, tenant: &str) -> QuiverResult<Vec<Tool>> {
        let sql = format!(
            "SELECT {} FROM quiver_tool WHERE tenant_name = $1 AND tool_type = 'system'
             ORDER BY name",
            TOOL_COLUMNS
        );
        self.tools(&sql, &[&tenant]).await
    }

    async fn general_tools(
        &self,
        tenant: &str,
        ids: Option<&HashSet<ToolId>>,
    ) -> QuiverResult<Vec<Tool>> {
        let ids: Option<Vec<ToolId>> = ids.map(|set| set.iter().copied().collect());
        let sql = format!(
            "SELECT {} FROM quiver_tool
             WHERE tenant_name = $1 AND tool_type = 'general'
               AND ($2::uuid[] IS NULL OR id = ANY($2))
             ORDER BY name",
            TOOL_COLUMNS
        );
        self.tools(&sql, &[&tenant, &ids]).await
    }

    async fn nearest_general_tools(
        &self,
        tenant: &str,
        query: &EmbeddingVector,
        ids: Option<&HashSet<ToolId>>,
        k: usize,
    ) -> QuiverResult<Vec<RankedTool>> {
        let ids: Option<Vec<ToolId>> = ids.map(|set| set.iter().copied().collect());
        let vector = vector_literal(query);
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {}, (embedding <=> $2::text::vector) AS distance FROM quiver_tool
             WHERE tenant_name = $1 AND tool_type = 'general' AND embedding IS NOT NULL
               AND vector_dims(embedding) = vector_dims($2::text::vector)
               AND ($3::uuid[] IS NULL OR id = ANY($3))
             ORDER BY distance, name
             LIMIT $4",
            TOOL_COLUMNS
        );
        let conn = self.conn().await?;
        let rows = conn
            .query(&sql, &[&tenant, &vector, &ids, &limit])
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|r| {
                let distance: f64 = column(r, "distance")?;
                Ok(RankedTool {
                    tool: tool_from_row(r)?,
                    distance: distance as f32,
                })
            })
            .collect()
    }
}
