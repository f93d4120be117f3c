//! Deterministic providers for tests and local runs

use crate::{ChainAnalyst, EmbeddingProvider, SkillDefinition, ToolRelProposal};
use async_trait::async_trait;
use quiver_core::{
    compute_content_hash, CandidatePath, EmbeddingVector, ProcedureStep, QuiverResult, Tool,
};

// ============================================================================
// MOCK EMBEDDING PROVIDER
// ============================================================================

/// Mock embedding provider.
///
/// Hashes each lower-cased word into one signed dimension, so texts sharing
/// words end up close. Same text, same vector.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl MockEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions: dimensions.max(1),
        }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let dims = self.dimensions as usize;
        let mut data = vec![0.0f32; dims];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = compute_content_hash(word.to_lowercase().as_bytes());
            let idx = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]) as usize % dims;
            let sign = if hash[4] & 1 == 0 { 1.0 } else { -1.0 };
            data[idx] += sign;
        }

        // Normalize to unit vector
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }

        data
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new("mock-embedding", 64)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> QuiverResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(
            self.generate_embedding(text),
            self.model_id.clone(),
        ))
    }

    async fn embed_batch(&self, texts: &[&str]) -> QuiverResult<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// MOCK CHAIN ANALYST
// ============================================================================

/// Mock analyst.
///
/// Without canned output it proposes one skill per candidate path, named
/// `<capability>__<tool>__<tool>...`, and no relationships.
#[derive(Debug, Clone, Default)]
pub struct MockChainAnalyst {
    skills: Option<Vec<SkillDefinition>>,
    relationships: Vec<ToolRelProposal>,
}

impl MockChainAnalyst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these skills from every extraction instead of deriving them.
    pub fn with_skills(mut self, skills: Vec<SkillDefinition>) -> Self {
        self.skills = Some(skills);
        self
    }

    /// Relationships to propose; each is returned when its source tool is analyzed.
    pub fn with_relationships(mut self, relationships: Vec<ToolRelProposal>) -> Self {
        self.relationships = relationships;
        self
    }

    fn skill_for_path(capability: &str, path: &CandidatePath) -> SkillDefinition {
        SkillDefinition {
            name: format!("{}__{}", capability, path.tools.join("__")),
            label: None,
            description: Some(format!("{} via {}", capability, path.tools.join(" then "))),
            operational_entities: Vec::new(),
            operational_procedures: path
                .tools
                .iter()
                .map(|tool| ProcedureStep {
                    tool: tool.clone(),
                    step_intent: None,
                })
                .collect(),
            operational_intent: None,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            proficiency: None,
        }
    }
}

#[async_trait]
impl ChainAnalyst for MockChainAnalyst {
    async fn extract_skills_from_tools(
        &self,
        capability: &str,
        paths: &[CandidatePath],
        _tools: &[Tool],
    ) -> QuiverResult<Vec<SkillDefinition>> {
        if let Some(skills) = &self.skills {
            return Ok(skills.clone());
        }
        Ok(paths
            .iter()
            .map(|path| Self::skill_for_path(capability, path))
            .collect())
    }

    async fn get_tool_rel_by_tool(
        &self,
        tool: &Tool,
        _candidates: &[Tool],
    ) -> QuiverResult<Vec<ToolRelProposal>> {
        Ok(self
            .relationships
            .iter()
            .filter(|r| r.source_tool == tool.name)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding_is_deterministic_and_unit_length() {
        let provider = MockEmbeddingProvider::new("m", 32);
        let a = provider.embed("Send an email").await.unwrap();
        let b = provider.embed("send an EMAIL").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimensions, 32);
        let norm: f32 = a.data.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let provider = MockEmbeddingProvider::new("m", 256);
        let query = provider.embed("send email").await.unwrap();
        let close = provider.embed("send an email to a lead").await.unwrap();
        let far = provider.embed("compute quarterly invoice totals").await.unwrap();
        let close_sim = query.cosine_similarity(&close).unwrap();
        let far_sim = query.cosine_similarity(&far).unwrap();
        assert!(close_sim > far_sim);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let provider = MockEmbeddingProvider::default();
        let batch = provider.embed_batch(&["a b", "c d"]).await.unwrap();
        assert_eq!(batch[1], provider.embed("c d").await.unwrap());
    }

    #[tokio::test]
    async fn test_analyst_derives_one_skill_per_path() {
        let analyst = MockChainAnalyst::new();
        let paths = vec![
            CandidatePath::new(vec!["a".into(), "b".into()]),
            CandidatePath::new(vec!["d".into()]),
        ];
        let skills = analyst
            .extract_skills_from_tools("billing", &paths, &[])
            .await
            .unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name, "billing__a__b");
        assert_eq!(skills[0].operational_procedures.len(), 2);
    }

    #[tokio::test]
    async fn test_analyst_relationships_filtered_by_source() {
        let analyst = MockChainAnalyst::new().with_relationships(vec![
            ToolRelProposal {
                source_tool: "a".into(),
                target_tool: "b".into(),
                composite_intent: None,
                field_mapping: None,
            },
            ToolRelProposal {
                source_tool: "b".into(),
                target_tool: "c".into(),
                composite_intent: None,
                field_mapping: None,
            },
        ]);
        let tool = Tool::new("a", "acme", "");
        let rels = analyst.get_tool_rel_by_tool(&tool, &[]).await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target_tool, "b");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_mock_embedding_is_case_insensitive_and_normalized(
            text in "[a-zA-Z ]{0,60}",
            dims in 1i32..128,
        ) {
            let provider = MockEmbeddingProvider::new("m", dims);
            let a = provider.generate_embedding(&text);
            let b = provider.generate_embedding(&text.to_uppercase());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), dims as usize);

            // Words hashing to one slot with opposite signs can cancel out.
            let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4, "norm {}", norm);
        }

        #[test]
        fn prop_single_word_embeds_to_unit_vector(word in "[a-z]{1,12}", dims in 1i32..128) {
            let provider = MockEmbeddingProvider::new("m", dims);
            let v = provider.generate_embedding(&word);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!((norm - 1.0).abs() < 1e-4);
        }
    }
}
