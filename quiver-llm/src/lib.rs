//! Quiver LLM - Embedding and Chain Analysis Traits
//!
//! Provider-agnostic interfaces for the two external collaborators the
//! registry talks to: an embedder for tool descriptions and search queries,
//! and an analyst that turns candidate tool paths into skill definitions and
//! proposes tool-to-tool relationships.

pub mod config;
pub mod mock;
pub mod providers;

pub use config::{EmbeddingConfig, EmbeddingProviderKind};
pub use mock::{MockChainAnalyst, MockEmbeddingProvider};
pub use providers::{OllamaEmbeddingProvider, OpenAIEmbeddingProvider};

use async_trait::async_trait;
use quiver_core::{CandidatePath, EmbeddingVector, ProcedureStep, QuiverResult, Skill, Tool};
use serde::{Deserialize, Serialize};

// ============================================================================
// EMBEDDING PROVIDER TRAIT
// ============================================================================

/// Trait for embedding providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> QuiverResult<EmbeddingVector>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> QuiverResult<Vec<EmbeddingVector>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> i32;

    /// Model identifier (e.g. "text-embedding-3-small").
    fn model_id(&self) -> &str;
}

// ============================================================================
// CHAIN ANALYST TRAIT
// ============================================================================

/// A skill proposed by the analyst. Procedure steps name tools; the
/// registry resolves them to ids when ingesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operational_entities: Vec<String>,
    #[serde(default)]
    pub operational_procedures: Vec<ProcedureStep>,
    #[serde(default)]
    pub operational_intent: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
    #[serde(default)]
    pub proficiency: Option<String>,
}

impl SkillDefinition {
    /// Skill row for a tenant, without embedding.
    pub fn into_skill(self, tenant: &str) -> Skill {
        let mut skill = Skill::new(self.name, tenant);
        skill.label = self.label;
        skill.description = self.description;
        skill.operational_entities = self.operational_entities;
        skill.operational_procedures = self.operational_procedures;
        skill.operational_intent = self.operational_intent;
        skill.preconditions = self.preconditions;
        skill.postconditions = self.postconditions;
        skill.proficiency = self.proficiency;
        skill
    }
}

/// A directed data-flow relationship proposed between two tools, by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRelProposal {
    pub source_tool: String,
    pub target_tool: String,
    #[serde(default)]
    pub composite_intent: Option<String>,
    #[serde(default)]
    pub field_mapping: Option<serde_json::Value>,
}

/// LLM collaborator for tool-chain analysis. Outputs are trusted
/// structured data.
#[async_trait]
pub trait ChainAnalyst: Send + Sync {
    /// Propose skills covering the candidate paths of one capability.
    async fn extract_skills_from_tools(
        &self,
        capability: &str,
        paths: &[CandidatePath],
        tools: &[Tool],
    ) -> QuiverResult<Vec<SkillDefinition>>;

    /// Propose relationships from `tool` to any of `candidates`.
    async fn get_tool_rel_by_tool(
        &self,
        tool: &Tool,
        candidates: &[Tool],
    ) -> QuiverResult<Vec<ToolRelProposal>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_definition_parses_minimal_payload() {
        let json = r#"{"name": "qualify_lead",
                       "operational_procedures": [{"tool": "lookup_lead", "step_intent": "find"}]}"#;
        let def: SkillDefinition = serde_json::from_str(json).unwrap();
        let skill = def.into_skill("acme");
        assert_eq!(skill.tenant_name, "acme");
        assert_eq!(skill.operational_procedures[0].tool, "lookup_lead");
        assert!(skill.preconditions.is_empty());
    }

    #[test]
    fn test_tool_rel_proposal_optional_fields() {
        let json = r#"{"source_tool": "a", "target_tool": "b"}"#;
        let rel: ToolRelProposal = serde_json::from_str(json).unwrap();
        assert!(rel.field_mapping.is_none());
    }
}
