#![cfg(feature = "db-tests")]
//! PgStore integration tests. Need a PostgreSQL with pgvector reachable via
//! the `QUIVER_DB_*` variables; each test works in a fresh tenant.

use quiver_core::{
    Capability, CapabilitySkill, CapabilityTool, Domain, DomainCapability, EmbeddingVector,
    QuiverError, StorageError, Tool, ToolChain, ToolSkill, Workflow, WorkflowStep,
};
use quiver_pg::{DbConfig, PgStore};
use quiver_storage::{EntityStore, SkillIngest};
use quiver_core::Skill;
use std::collections::HashSet;
use uuid::Uuid;

async fn test_store() -> PgStore {
    let store = PgStore::from_config(&DbConfig::from_env()).expect("Failed to create pool");
    store.migrate().await.expect("Failed to migrate");
    store
}

fn fresh_tenant() -> String {
    format!("t_{}", Uuid::now_v7().simple())
}

fn step(tenant: &str, skill: &str, tool: &Tool, index: i32) -> ToolSkill {
    ToolSkill {
        tenant_name: tenant.to_string(),
        tool_id: tool.id,
        skill_name: skill.to_string(),
        step_index: index,
        step_intent: None,
    }
}

#[tokio::test]
async fn test_tool_upsert_and_duplicate_name() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    let tool = Tool::new("lookup_lead", &tenant, "Find a lead")
        .with_embedding(EmbeddingVector::new(vec![1.0, 0.0, 0.0], "m"));
    let stored = store.tool_upsert(&tool).await.unwrap();
    assert_eq!(stored.id, tool.id);
    assert_eq!(stored.embedding.as_ref().map(|e| e.dimensions), Some(3));

    let clash = Tool::new("lookup_lead", &tenant, "Another");
    let err = store.tool_upsert(&clash).await.unwrap_err();
    assert_eq!(err.duplicate_tool_id(), Some(tool.id));
}

#[tokio::test]
async fn test_nearest_orders_by_distance() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    let near = Tool::new("near", &tenant, "near")
        .with_embedding(EmbeddingVector::new(vec![1.0, 0.0], "m"));
    let far = Tool::new("far", &tenant, "far")
        .with_embedding(EmbeddingVector::new(vec![0.0, 1.0], "m"));
    let bare = Tool::new("bare", &tenant, "no embedding");
    for t in [&near, &far, &bare] {
        store.tool_upsert(t).await.unwrap();
    }

    let query = EmbeddingVector::new(vec![0.9, 0.1], "m");
    let ranked = store
        .nearest_general_tools(&tenant, &query, None, 10)
        .await
        .unwrap();
    let names: Vec<_> = ranked.iter().map(|r| r.tool.name.as_str()).collect();
    assert_eq!(names, vec!["near", "far"]);
    assert!(ranked[0].distance < ranked[1].distance);

    let only_far: HashSet<_> = [far.id].into_iter().collect();
    let ranked = store
        .nearest_general_tools(&tenant, &query, Some(&only_far), 10)
        .await
        .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].tool.id, far.id);
}

#[tokio::test]
async fn test_nearest_skips_other_dimensions() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    let small = Tool::new("small", &tenant, "two dims")
        .with_embedding(EmbeddingVector::new(vec![1.0, 0.0], "m"));
    let large = Tool::new("large", &tenant, "three dims")
        .with_embedding(EmbeddingVector::new(vec![1.0, 0.0, 0.0], "other"));
    store.tool_upsert(&small).await.unwrap();
    store.tool_upsert(&large).await.unwrap();

    let ranked = store
        .nearest_general_tools(&tenant, &EmbeddingVector::new(vec![1.0, 0.0], "m"), None, 10)
        .await
        .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].tool.id, small.id);
}

#[tokio::test]
async fn test_tool_delete_cascades_skills() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    let a = store.tool_upsert(&Tool::new("a", &tenant, "a")).await.unwrap();
    let b = store.tool_upsert(&Tool::new("b", &tenant, "b")).await.unwrap();
    store.capability_upsert(&Capability::new("leads", &tenant)).await.unwrap();

    let solo = SkillIngest {
        skill: Skill::new("solo", &tenant),
        steps: vec![step(&tenant, "solo", &a, 0)],
        capabilities: vec!["leads".to_string(), "missing".to_string()],
    };
    let outcome = store.skill_ingest(&solo).await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.linked_capabilities, vec!["leads"]);
    assert_eq!(outcome.skipped_capabilities, vec!["missing"]);

    let pair = SkillIngest {
        skill: Skill::new("pair", &tenant),
        steps: vec![step(&tenant, "pair", &a, 0), step(&tenant, "pair", &b, 1)],
        capabilities: vec![],
    };
    store.skill_ingest(&pair).await.unwrap();

    let deletion = store.tool_delete(&tenant, a.id).await.unwrap().unwrap();
    assert_eq!(deletion.removed_skills, vec!["solo"]);
    assert_eq!(deletion.trimmed_skills, vec!["pair"]);
    assert!(store.skill_get(&tenant, "solo").await.unwrap().is_none());

    let remaining = store.tool_skill_list(&tenant).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].tool_id, b.id);
    assert!(store.capability_skill_list(&tenant).await.unwrap().is_empty());
    assert!(store.tool_delete(&tenant, a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_skill_by_exact_chain() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    let a = store.tool_upsert(&Tool::new("a", &tenant, "a")).await.unwrap();
    let b = store.tool_upsert(&Tool::new("b", &tenant, "b")).await.unwrap();
    let ingest = SkillIngest {
        skill: Skill::new("qualify", &tenant),
        steps: vec![step(&tenant, "qualify", &a, 0), step(&tenant, "qualify", &b, 1)],
        capabilities: vec![],
    };
    store.skill_ingest(&ingest).await.unwrap();

    let exact = ToolChain::from_ordered(&[a.id, b.id]);
    let found = store.skill_find_by_tool_chain(&tenant, &exact).await.unwrap();
    assert_eq!(found.map(|s| s.name), Some("qualify".to_string()));

    let reversed = ToolChain::from_ordered(&[b.id, a.id]);
    assert!(store.skill_find_by_tool_chain(&tenant, &reversed).await.unwrap().is_none());
    let prefix = ToolChain::from_ordered(&[a.id]);
    assert!(store.skill_find_by_tool_chain(&tenant, &prefix).await.unwrap().is_none());
}

#[tokio::test]
async fn test_links_skip_missing_endpoints() {
    let store = test_store().await;
    let tenant = fresh_tenant();

    store.domain_upsert(&Domain::new("sales", &tenant)).await.unwrap();
    let link = DomainCapability {
        tenant_name: tenant.clone(),
        domain_name: "sales".to_string(),
        capability_name: "ghost".to_string(),
    };
    assert!(!store.domain_capability_link(&link).await.unwrap());

    store.capability_upsert(&Capability::new("ghost", &tenant)).await.unwrap();
    assert!(store.domain_capability_link(&link).await.unwrap());
    assert!(store.domain_capability_link(&link).await.unwrap());
    assert_eq!(store.domain_capability_list(&tenant).await.unwrap().len(), 1);

    let tool_link = CapabilityTool {
        tenant_name: tenant.clone(),
        capability_name: "ghost".to_string(),
        tool_id: Uuid::now_v7(),
    };
    assert!(!store.capability_tool_link(&tool_link).await.unwrap());

    let skill_link = CapabilitySkill {
        tenant_name: tenant.clone(),
        capability_name: "ghost".to_string(),
        skill_name: "nope".to_string(),
    };
    assert!(!store.capability_skill_link(&skill_link).await.unwrap());
}

#[tokio::test]
async fn test_workflow_drops_dangling_step_links() {
    let store = test_store().await;
    let tenant = fresh_tenant();
    store.domain_upsert(&Domain::new("sales", &tenant)).await.unwrap();

    let mut workflow = Workflow::new("onboard", &tenant);
    workflow.steps = vec![
        WorkflowStep {
            step_index: 1,
            name: "second".to_string(),
            intent: None,
            domains: vec![],
            capabilities: vec!["missing".to_string()],
        },
        WorkflowStep {
            step_index: 0,
            name: "first".to_string(),
            intent: Some("start".to_string()),
            domains: vec!["sales".to_string(), "nowhere".to_string()],
            capabilities: vec![],
        },
    ];
    let stored = store.workflow_upsert(&workflow).await.unwrap();
    assert_eq!(stored.steps[0].name, "first");
    assert_eq!(stored.steps[0].domains, vec!["sales"]);
    assert!(stored.steps[1].capabilities.is_empty());

    let listed = store.workflow_list(&tenant).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].steps, stored.steps);
}

#[tokio::test]
async fn test_skill_ingest_rejects_foreign_tool() {
    let store = test_store().await;
    let tenant = fresh_tenant();
    let other = fresh_tenant();

    let foreign = store.tool_upsert(&Tool::new("x", &other, "x")).await.unwrap();
    let ingest = SkillIngest {
        skill: Skill::new("s", &tenant),
        steps: vec![step(&tenant, "s", &foreign, 0)],
        capabilities: vec![],
    };
    let err = store.skill_ingest(&ingest).await.unwrap_err();
    assert!(matches!(
        err,
        QuiverError::Storage(StorageError::InsertFailed { .. })
    ));
}
