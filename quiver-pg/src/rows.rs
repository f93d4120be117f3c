//! Row decoding and pgvector text encoding

use crate::error::{column, decode_error};
use quiver_core::{
    Capability, Domain, EmbeddingVector, ProcedureStep, QuiverResult, Skill, Tool, ToolType,
};
use tokio_postgres::Row;

// ============================================================================
// VECTORS
// ============================================================================

/// pgvector text form, bound as `$n::text::vector`.
pub(crate) fn vector_literal(vector: &EmbeddingVector) -> String {
    let parts: Vec<String> = vector.data.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(","))
}

pub(crate) fn optional_vector_literal(vector: &Option<EmbeddingVector>) -> Option<String> {
    vector.as_ref().map(vector_literal)
}

/// Parse `embedding::text` back into a vector.
pub(crate) fn parse_vector(text: &str, model_id: &str) -> QuiverResult<EmbeddingVector> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| decode_error("embedding", format!("not a vector literal: {}", text)))?;
    if inner.trim().is_empty() {
        return Ok(EmbeddingVector::new(Vec::new(), model_id));
    }
    let data = inner
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| decode_error("embedding", e.to_string()))?;
    Ok(EmbeddingVector::new(data, model_id))
}

fn embedding(row: &Row) -> QuiverResult<Option<EmbeddingVector>> {
    let text: Option<String> = column(row, "embedding")?;
    let model: Option<String> = column(row, "embedding_model")?;
    text.map(|t| parse_vector(&t, model.as_deref().unwrap_or_default()))
        .transpose()
}

// ============================================================================
// ENTITIES
// ============================================================================

pub(crate) const DOMAIN_COLUMNS: &str = "tenant_name, name, label, description, scope, \
     domain_entities, domain_purposes, value_metrics, embedding::text AS embedding, \
     embedding_model, created_at, updated_at";

pub(crate) fn domain_from_row(row: &Row) -> QuiverResult<Domain> {
    Ok(Domain {
        name: column(row, "name")?,
        tenant_name: column(row, "tenant_name")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        scope: column(row, "scope")?,
        domain_entities: column(row, "domain_entities")?,
        domain_purposes: column(row, "domain_purposes")?,
        value_metrics: column(row, "value_metrics")?,
        embedding: embedding(row)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) const CAPABILITY_COLUMNS: &str = "tenant_name, name, label, description, \
     business_context, business_processes, outcome, business_intent, \
     embedding::text AS embedding, embedding_model, created_at, updated_at";

pub(crate) fn capability_from_row(row: &Row) -> QuiverResult<Capability> {
    Ok(Capability {
        name: column(row, "name")?,
        tenant_name: column(row, "tenant_name")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        business_context: column(row, "business_context")?,
        business_processes: column(row, "business_processes")?,
        outcome: column(row, "outcome")?,
        business_intent: column(row, "business_intent")?,
        embedding: embedding(row)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) const SKILL_COLUMNS: &str = "tenant_name, name, label, description, \
     operational_entities, operational_procedures, operational_intent, preconditions, \
     postconditions, proficiency, embedding::text AS embedding, embedding_model, \
     created_at, updated_at";

pub(crate) fn skill_from_row(row: &Row) -> QuiverResult<Skill> {
    let procedures: serde_json::Value = column(row, "operational_procedures")?;
    let operational_procedures: Vec<ProcedureStep> = serde_json::from_value(procedures)
        .map_err(|e| decode_error("operational_procedures", e.to_string()))?;
    Ok(Skill {
        name: column(row, "name")?,
        tenant_name: column(row, "tenant_name")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        operational_entities: column(row, "operational_entities")?,
        operational_procedures,
        operational_intent: column(row, "operational_intent")?,
        preconditions: column(row, "preconditions")?,
        postconditions: column(row, "postconditions")?,
        proficiency: column(row, "proficiency")?,
        embedding: embedding(row)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) const TOOL_COLUMNS: &str = "id, tenant_name, name, description, \
     embedding::text AS embedding, embedding_model, document, canonical_data, tool_type, \
     app_name, created_at, updated_at";

pub(crate) fn tool_from_row(row: &Row) -> QuiverResult<Tool> {
    let tool_type: String = column(row, "tool_type")?;
    Ok(Tool {
        id: column(row, "id")?,
        name: column(row, "name")?,
        tenant: column(row, "tenant_name")?,
        description: column(row, "description")?,
        embedding: embedding(row)?,
        document: column(row, "document")?,
        canonical_data: column(row, "canonical_data")?,
        tool_type: ToolType::from_db_str(&tool_type)
            .map_err(|e| decode_error("tool_type", e.to_string()))?,
        app_name: column(row, "app_name")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_roundtrip() {
        let v = EmbeddingVector::new(vec![0.5, -1.0, 0.25], "m");
        let text = vector_literal(&v);
        assert_eq!(text, "[0.5,-1,0.25]");
        assert_eq!(parse_vector(&text, "m").unwrap(), v);
    }

    #[test]
    fn test_parse_vector_tolerates_spaces() {
        let v = parse_vector("[1, 2 ,3]", "m").unwrap();
        assert_eq!(v.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimensions, 3);
    }

    #[test]
    fn test_parse_vector_rejects_garbage() {
        assert!(parse_vector("1,2,3", "m").is_err());
        assert!(parse_vector("[1,x]", "m").is_err());
    }
}
