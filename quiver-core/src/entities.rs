//! Core entity structures
//!
//! Every entity and join row is scoped to a tenant. Domains, capabilities,
//! skills and workflows are keyed by `(name, tenant_name)`; tools carry a
//! global id and are also unique per `(name, tenant)`.

use crate::{EmbeddingVector, Timestamp, ToolId, ToolType};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// BUSINESS HIERARCHY
// ============================================================================

/// Domain - top-level business area grouping capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub tenant_name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub domain_entities: Vec<String>,
    pub domain_purposes: Option<String>,
    #[serde(default)]
    pub value_metrics: Vec<String>,
    pub embedding: Option<EmbeddingVector>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Domain {
    pub fn new(name: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tenant_name: tenant_name.into(),
            label: None,
            description: None,
            scope: None,
            domain_entities: Vec::new(),
            domain_purposes: None,
            value_metrics: Vec::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Capability - a business function within one or more domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub tenant_name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub business_context: Vec<String>,
    #[serde(default)]
    pub business_processes: Vec<String>,
    pub outcome: Option<String>,
    #[serde(default)]
    pub business_intent: Vec<String>,
    pub embedding: Option<EmbeddingVector>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Capability {
    pub fn new(name: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tenant_name: tenant_name.into(),
            label: None,
            description: None,
            business_context: Vec::new(),
            business_processes: Vec::new(),
            outcome: None,
            business_intent: Vec::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One step of a skill's operational procedure, naming the tool it invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub tool: String,
    pub step_intent: Option<String>,
}

/// Skill - a reusable, ordered multi-tool procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub tenant_name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub operational_entities: Vec<String>,
    #[serde(default)]
    pub operational_procedures: Vec<ProcedureStep>,
    pub operational_intent: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
    pub proficiency: Option<String>,
    pub embedding: Option<EmbeddingVector>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Skill {
    pub fn new(name: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tenant_name: tenant_name.into(),
            label: None,
            description: None,
            operational_entities: Vec::new(),
            operational_procedures: Vec::new(),
            operational_intent: None,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            proficiency: None,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a procedure step naming a tool.
    pub fn with_step(mut self, tool: impl Into<String>, step_intent: Option<&str>) -> Self {
        self.operational_procedures.push(ProcedureStep {
            tool: tool.into(),
            step_intent: step_intent.map(str::to_string),
        });
        self
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// Tool - an invocable external capability (MCP tool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub tenant: String,
    pub description: String,
    pub embedding: Option<EmbeddingVector>,
    /// Full tool schema as registered.
    pub document: serde_json::Value,
    /// LLM-derived summary of the tool.
    pub canonical_data: Option<serde_json::Value>,
    pub tool_type: ToolType,
    pub app_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        tenant: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_tool_id(),
            name: name.into(),
            tenant: tenant.into(),
            description: description.into(),
            embedding: None,
            document: serde_json::Value::Object(serde_json::Map::new()),
            canonical_data: None,
            tool_type: ToolType::General,
            app_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn system(mut self) -> Self {
        self.tool_type = ToolType::System;
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingVector) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text fed to the embedder for this tool.
    pub fn embedding_text(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

/// A position in a skill's tool chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainLink {
    pub step_index: i32,
    pub tool_id: ToolId,
}

/// The ordered (tool_id, step_index) pairs bound to a skill.
///
/// Two chains are equal only when they hold exactly the same pairs: no
/// superset, subset or reordering matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ToolChain {
    links: Vec<ChainLink>,
}

impl ToolChain {
    pub fn new(links: impl IntoIterator<Item = ChainLink>) -> Self {
        let mut links: Vec<ChainLink> = links.into_iter().collect();
        links.sort();
        links.dedup();
        Self { links }
    }

    /// Chain from tool ids in invocation order, numbering steps from 0.
    pub fn from_ordered(tool_ids: &[ToolId]) -> Self {
        Self::new(tool_ids.iter().enumerate().map(|(i, id)| ChainLink {
            step_index: i as i32,
            tool_id: *id,
        }))
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn tool_ids(&self) -> Vec<ToolId> {
        self.links.iter().map(|l| l.tool_id).collect()
    }

    pub fn contains_tool(&self, tool_id: ToolId) -> bool {
        self.links.iter().any(|l| l.tool_id == tool_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

// ============================================================================
// JOIN ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainCapability {
    pub tenant_name: String,
    pub domain_name: String,
    pub capability_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySkill {
    pub tenant_name: String,
    pub capability_name: String,
    pub skill_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityTool {
    pub tenant_name: String,
    pub capability_name: String,
    pub tool_id: ToolId,
}

/// Binds a tool to a step of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolSkill {
    pub tenant_name: String,
    pub tool_id: ToolId,
    pub skill_name: String,
    pub step_index: i32,
    pub step_intent: Option<String>,
}

/// Directed tool-to-tool data-flow relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRel {
    pub tenant_name: String,
    pub source_tool_id: ToolId,
    pub target_tool_id: ToolId,
    pub composite_intent: Option<String>,
    pub field_mapping: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationTool {
    pub tenant_name: String,
    pub application_name: String,
    pub tool_id: ToolId,
}

// ============================================================================
// WORKFLOWS
// ============================================================================

/// Workflow - an ordered business process spanning domains and capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub tenant_name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Workflow {
    pub fn new(name: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tenant_name: tenant_name.into(),
            label: None,
            description: None,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Graph node name of a step: steps are only unique within their workflow.
    pub fn step_node_name(&self, step: &WorkflowStep) -> String {
        format!("{}#{}", self.name, step.step_index)
    }
}

/// One step of a workflow. `domains` and `capabilities` are the
/// WorkflowStepDomain / WorkflowStepCapability join rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_index: i32,
    pub name: String,
    pub intent: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

// ============================================================================
// IAM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub created_at: Timestamp,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub tenant_name: String,
    pub role_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub tenant_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub tenant_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleDomain {
    pub tenant_name: String,
    pub role_name: String,
    pub domain_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAgent {
    pub tenant_name: String,
    pub role_name: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleUser {
    pub tenant_name: String,
    pub role_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAgent {
    pub tenant_name: String,
    pub user_id: String,
    pub agent_id: String,
}
