//! Skill ingest and the two LLM-driven inference pipelines.
//!
//! `ingest_skill` is the single write path for skills: procedure steps name
//! tools, which are resolved to ids and numbered from 0. A skill whose
//! resolved chain already exists keeps the stored skill's name, so one chain
//! maps to one skill row.

use crate::registry::Registry;
use quiver_core::{
    EntityType, QuiverError, QuiverResult, Skill, StorageError, Tool, ToolChain, ToolId,
    ToolSkill, ValidationError,
};
use quiver_storage::SkillIngest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What `ingest_skill` stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillIngestReport {
    /// Name the skill is stored under.
    pub skill: String,
    /// True when no row existed under that name before.
    pub created: bool,
    /// The chain matched an existing skill stored under another name.
    pub merged_into_existing: bool,
    /// Tool names in step order.
    pub tools: Vec<String>,
    /// Procedure steps naming tools that are not registered.
    pub skipped_steps: Vec<String>,
    pub linked_capabilities: Vec<String>,
    pub skipped_capabilities: Vec<String>,
}

/// What `analyze_tool_relationships` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipReport {
    pub tool: String,
    /// False when the tool was already analyzed and not forced.
    pub analyzed: bool,
    pub candidates: usize,
    /// (source, target) pairs persisted.
    pub relationships: Vec<(String, String)>,
    /// Proposals naming unknown tools.
    pub skipped: usize,
}

impl Registry {
    /// Store a skill, its tool chain and its capability links, then mirror
    /// the skill node with HAS_SKILL and USES_TOOL edges.
    pub async fn ingest_skill(
        &self,
        mut skill: Skill,
        capabilities: &[String],
    ) -> QuiverResult<SkillIngestReport> {
        if skill.name.trim().is_empty() {
            return Err(QuiverError::Validation(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }));
        }
        let tenant = skill.tenant_name.clone();

        let mut chain: Vec<(Tool, Option<String>)> = Vec::new();
        let mut skipped_steps = Vec::new();
        for step in &skill.operational_procedures {
            match self.store.tool_get_by_name(&tenant, &step.tool).await? {
                Some(tool) => chain.push((tool, step.step_intent.clone())),
                None => {
                    tracing::warn!(
                        tenant = %tenant,
                        skill = %skill.name,
                        tool = %step.tool,
                        "Procedure step names an unknown tool, step skipped"
                    );
                    skipped_steps.push(step.tool.clone());
                }
            }
        }
        if chain.is_empty() {
            return Err(QuiverError::Validation(ValidationError::EmptyToolChain {
                skill: skill.name,
            }));
        }

        let tool_ids: Vec<ToolId> = chain.iter().map(|(t, _)| t.id).collect();
        let mut merged_into_existing = false;
        if let Some(existing) = self
            .store
            .skill_find_by_tool_chain(&tenant, &ToolChain::from_ordered(&tool_ids))
            .await?
        {
            if existing.name != skill.name {
                tracing::info!(
                    tenant = %tenant,
                    proposed = %skill.name,
                    existing = %existing.name,
                    "Tool chain already bound to a skill, updating it"
                );
                skill.name = existing.name;
                merged_into_existing = true;
            }
        }

        if skill.embedding.is_none() {
            let text = skill.description.as_deref().unwrap_or(&skill.name);
            skill.embedding = Some(self.embedder.embed(text).await?);
        }

        let steps: Vec<ToolSkill> = chain
            .iter()
            .enumerate()
            .map(|(i, (tool, intent))| ToolSkill {
                tenant_name: tenant.clone(),
                tool_id: tool.id,
                skill_name: skill.name.clone(),
                step_index: i as i32,
                step_intent: intent.clone(),
            })
            .collect();
        let ingest = SkillIngest {
            skill,
            steps,
            capabilities: capabilities.to_vec(),
        };
        let outcome = self.store.skill_ingest(&ingest).await?;
        let skill = &ingest.skill;

        for capability in &outcome.skipped_capabilities {
            tracing::warn!(
                tenant = %tenant,
                skill = %skill.name,
                capability = %capability,
                "Capability missing, skill link skipped"
            );
        }

        self.mirror.remove_uses_tool_edges(&tenant, &skill.name).await?;
        self.mirror.create_skill_node(skill).await?;
        for capability in &outcome.linked_capabilities {
            self.mirror
                .create_has_skill_edge(&tenant, capability, &skill.name)
                .await?;
        }
        for ((tool, _), step) in chain.iter().zip(&ingest.steps) {
            self.mirror
                .create_uses_tool_edge(&tenant, &skill.name, &tool.name, step)
                .await?;
        }

        tracing::info!(
            tenant = %tenant,
            skill = %skill.name,
            steps = ingest.steps.len(),
            created = outcome.created,
            "Skill ingested"
        );
        Ok(SkillIngestReport {
            skill: skill.name.clone(),
            created: outcome.created,
            merged_into_existing,
            tools: chain.into_iter().map(|(t, _)| t.name).collect(),
            skipped_steps,
            linked_capabilities: outcome.linked_capabilities,
            skipped_capabilities: outcome.skipped_capabilities,
        })
    }

    /// Skill bound to exactly this ordered list of tool names.
    pub async fn find_skill_by_tool_chain(
        &self,
        tenant: &str,
        tool_names: &[String],
    ) -> QuiverResult<Option<Skill>> {
        let mut ids = Vec::with_capacity(tool_names.len());
        for name in tool_names {
            match self.store.tool_get_by_name(tenant, name).await? {
                Some(tool) => ids.push(tool.id),
                None => return Ok(None),
            }
        }
        if ids.is_empty() {
            return Ok(None);
        }
        self.store
            .skill_find_by_tool_chain(tenant, &ToolChain::from_ordered(&ids))
            .await
    }

    /// Ask the analyst which tools sharing a capability with `tool_name`
    /// consume its output, persist each proposal as a ToolRel with a
    /// NEXT_TOOL edge, and mark the tool analyzed.
    pub async fn analyze_tool_relationships(
        &self,
        tenant: &str,
        tool_name: &str,
        force: bool,
    ) -> QuiverResult<RelationshipReport> {
        let analyst = self.analyst()?;
        let tool = self
            .store
            .tool_get_by_name(tenant, tool_name)
            .await?
            .ok_or_else(|| {
                QuiverError::Storage(StorageError::NotFound {
                    entity_type: EntityType::Tool,
                    tenant: tenant.to_string(),
                    key: tool_name.to_string(),
                })
            })?;

        let mut report = RelationshipReport {
            tool: tool.name.clone(),
            ..Default::default()
        };
        if !force && self.mirror.is_tool_analyzed(tenant, &tool.name).await? {
            tracing::debug!(tenant = %tenant, tool = %tool.name, "Tool already analyzed");
            return Ok(report);
        }

        let capabilities = self.store.tool_capability_names(tenant, tool.id).await?;
        let mut ids = self
            .store
            .tool_ids_via_capability_tools(tenant, &capabilities)
            .await?;
        ids.remove(&tool.id);
        let candidates = if ids.is_empty() {
            Vec::new()
        } else {
            self.store.general_tools(tenant, Some(&ids)).await?
        };
        report.candidates = candidates.len();

        if !candidates.is_empty() {
            let proposals = analyst.get_tool_rel_by_tool(&tool, &candidates).await?;
            for proposal in proposals {
                let result = self
                    .upsert_tool_rel(
                        tenant,
                        &proposal.source_tool,
                        &proposal.target_tool,
                        proposal.composite_intent,
                        proposal.field_mapping,
                    )
                    .await;
                match result {
                    Ok(_) => report
                        .relationships
                        .push((proposal.source_tool, proposal.target_tool)),
                    Err(QuiverError::Storage(StorageError::NotFound { key, .. })) => {
                        tracing::warn!(
                            tenant = %tenant,
                            source = %proposal.source_tool,
                            target = %proposal.target_tool,
                            missing = %key,
                            "Proposed relationship names an unknown tool, skipped"
                        );
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.mirror.mark_tool_analyzed(tenant, &tool.name).await?;
        report.analyzed = true;
        tracing::info!(
            tenant = %tenant,
            tool = %tool.name,
            candidates = report.candidates,
            relationships = report.relationships.len(),
            skipped = report.skipped,
            "Tool relationships analyzed"
        );
        Ok(report)
    }

    /// Read candidate tool paths of a capability from the graph, have the
    /// analyst turn them into skills, and ingest each under the capability.
    /// With `src_tool`, only paths through that tool are considered.
    pub async fn infer_skills_for_capability(
        &self,
        tenant: &str,
        capability: &str,
        src_tool: Option<&str>,
    ) -> QuiverResult<Vec<SkillIngestReport>> {
        let analyst = self.analyst()?;
        let paths = self
            .mirror
            .get_tool_candidate_paths(tenant, capability, src_tool)
            .await?;
        if paths.is_empty() {
            tracing::debug!(tenant = %tenant, capability = %capability, "No candidate paths");
            return Ok(Vec::new());
        }

        let names: BTreeSet<&str> = paths
            .iter()
            .flat_map(|p| p.tools.iter().map(String::as_str))
            .collect();
        let mut tools = Vec::with_capacity(names.len());
        for name in names {
            if let Some(tool) = self.store.tool_get_by_name(tenant, name).await? {
                tools.push(tool);
            }
        }

        let definitions = analyst
            .extract_skills_from_tools(capability, &paths, &tools)
            .await?;
        let capabilities = [capability.to_string()];
        let mut reports = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let name = definition.name.clone();
            match self
                .ingest_skill(definition.into_skill(tenant), &capabilities)
                .await
            {
                Ok(report) => reports.push(report),
                Err(QuiverError::Validation(e)) => {
                    tracing::warn!(
                        tenant = %tenant,
                        capability = %capability,
                        skill = %name,
                        error = %e,
                        "Proposed skill rejected"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            tenant = %tenant,
            capability = %capability,
            paths = paths.len(),
            skills = reports.len(),
            "Skills inferred"
        );
        Ok(reports)
    }
}
