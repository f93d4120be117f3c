//! Registry writes against the acme fixture: relational rows first, graph
//! mirror second.

use quiver_core::{
    Capability, Domain, EdgeKind, EntityType, NodeLabel, Tool, ToolType, Workflow, WorkflowStep,
};
use quiver_core::GraphError;
use quiver_graph::{project, GraphStore};
use quiver_storage::EntityStore;
use quiver_test_utils::assertions::{assert_duplicate_tool, assert_not_found};
use quiver_test_utils::fixtures::Acme;
use quiver_test_utils::ACME;

#[path = "support/registry.rs"]
mod test_registry_support;
use test_registry_support::{acme_request, names, test_registry};

#[tokio::test]
async fn test_register_tool_embeds_links_and_mirrors() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let tool = registry
        .register_tool(
            Tool::new("score_lead", ACME, "Score a lead"),
            &["leads".to_string(), "ghost".to_string()],
        )
        .await
        .unwrap();

    assert!(tool.embedding.is_some());
    assert!(registry.mirror().has_tool_node(ACME, "score_lead").await.unwrap());
    let links = acme.store.capability_tool_list(ACME).await.unwrap();
    assert!(links
        .iter()
        .any(|l| l.capability_name == "leads" && l.tool_id == tool.id));
    assert!(!links.iter().any(|l| l.capability_name == "ghost"));

    let results = registry
        .search_mcp_tools(&acme_request().with_agent("bob"))
        .await
        .unwrap();
    assert_eq!(names(&results), vec!["score_lead", "sys1", "t1"]);
}

#[tokio::test]
async fn test_register_tool_rejects_taken_name() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let result = registry
        .register_tool(Tool::new("t1", ACME, "Another t1"), &[])
        .await;

    assert_duplicate_tool(&result, acme.t1.id);
    assert_eq!(acme.store.tool_count(ACME).unwrap(), 3);
}

#[tokio::test]
async fn test_register_tool_updates_same_id() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let mut edited = acme.t1.clone();
    edited.description = "Find a lead by phone number".to_string();
    let stored = registry.register_tool(edited, &[]).await.unwrap();

    assert_eq!(stored.id, acme.t1.id);
    assert_eq!(stored.description, "Find a lead by phone number");
    assert_ne!(stored.embedding, acme.t1.embedding);
}

#[tokio::test]
async fn test_register_tool_rename_drops_old_node() {
    let acme = Acme::seed().await.unwrap();
    acme.project().await.unwrap();
    let registry = test_registry(&acme);

    let mut renamed = acme.t1.clone();
    renamed.name = "find_lead".to_string();
    registry.register_tool(renamed, &[]).await.unwrap();

    assert!(!registry.mirror().has_tool_node(ACME, "t1").await.unwrap());
    assert!(registry.mirror().has_tool_node(ACME, "find_lead").await.unwrap());
    assert_eq!(acme.store.tool_count(ACME).unwrap(), 3);
}

#[tokio::test]
async fn test_register_tool_survives_unavailable_graph() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);
    acme.graph.set_unavailable(true);

    let tool = registry
        .register_tool(Tool::new("offline", ACME, "Registered while the graph is down"), &[
            "leads".to_string(),
        ])
        .await
        .unwrap();

    assert!(acme.store.tool_get(ACME, tool.id).await.unwrap().is_some());
    acme.graph.set_unavailable(false);
    assert!(!registry.mirror().has_tool_node(ACME, "offline").await.unwrap());
}

#[tokio::test]
async fn test_graph_read_checks_propagate_errors() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);
    acme.graph.set_unavailable(true);

    assert!(registry.mirror().has_tool_node(ACME, "t1").await.is_err());
}

#[tokio::test]
async fn test_strict_mirror_surfaces_malformed_graph_responses() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);
    acme.graph
        .fail_next(GraphError::InvalidResponse {
            reason: "unexpected payload".to_string(),
        });

    let result = registry
        .register_tool(Tool::new("strict", ACME, "Mirror is strict in tests"), &[])
        .await;

    assert!(result.is_err());
    // the relational write is kept
    assert!(acme.store.tool_get_by_name(ACME, "strict").await.unwrap().is_some());
}

#[tokio::test]
async fn test_scenario_delete_tool_cascades_skills() {
    let acme = Acme::seed().await.unwrap();
    acme.add_email_skills().await.unwrap();
    acme.project().await.unwrap();
    let registry = test_registry(&acme);

    let deletion = registry
        .delete_tool(ACME, acme.t1.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(deletion.removed_skills, vec!["draft_email"]);
    assert_eq!(deletion.trimmed_skills, vec!["send_and_log"]);

    assert!(acme.store.skill_get(ACME, "draft_email").await.unwrap().is_none());
    let capability_skills = acme.store.capability_skill_list(ACME).await.unwrap();
    assert!(capability_skills.iter().all(|cs| cs.skill_name != "draft_email"));
    assert!(capability_skills.iter().any(|cs| cs.skill_name == "send_and_log"));

    let steps: Vec<_> = acme
        .store
        .tool_skill_list(ACME)
        .await
        .unwrap()
        .into_iter()
        .filter(|ts| ts.skill_name == "send_and_log")
        .collect();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].tool_id, acme.t2.id);

    let draft_email = project::key(NodeLabel::Skill, "draft_email", ACME);
    let send_and_log = project::key(NodeLabel::Skill, "send_and_log", ACME);
    assert!(acme.graph.node(&draft_email).await.unwrap().is_none());
    assert!(acme.graph.node(&send_and_log).await.unwrap().is_some());
    let used = acme
        .graph
        .neighbors(EdgeKind::UsesTool, &send_and_log, quiver_graph::Direction::Outgoing)
        .await
        .unwrap();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].key.name, "t2");
    assert!(!registry.mirror().has_tool_node(ACME, "t1").await.unwrap());
}

#[tokio::test]
async fn test_delete_tool_removes_skill_nodes_missing_their_edges() {
    let acme = Acme::seed().await.unwrap();
    acme.add_email_skills().await.unwrap();
    acme.project().await.unwrap();
    let registry = test_registry(&acme);
    // as if the USES_TOOL write had failed during ingest
    registry
        .mirror()
        .remove_uses_tool_edges(ACME, "draft_email")
        .await
        .unwrap();

    registry.delete_tool(ACME, acme.t1.id).await.unwrap();

    let draft_email = project::key(NodeLabel::Skill, "draft_email", ACME);
    assert!(acme.graph.node(&draft_email).await.unwrap().is_none());
    let send_and_log = project::key(NodeLabel::Skill, "send_and_log", ACME);
    assert!(acme.graph.node(&send_and_log).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_missing_tool_returns_none() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let deleted = registry
        .delete_tool(ACME, quiver_core::new_tool_id())
        .await
        .unwrap();

    assert!(deleted.is_none());
    assert_eq!(acme.store.tool_count(ACME).unwrap(), 3);
}

#[tokio::test]
async fn test_upsert_tool_rel_requires_both_tools() {
    let acme = Acme::seed().await.unwrap();
    acme.project().await.unwrap();
    let registry = test_registry(&acme);

    let missing = registry
        .upsert_tool_rel(ACME, "t1", "ghost", None, None)
        .await;
    assert_not_found(&missing, EntityType::Tool);

    let rel = registry
        .upsert_tool_rel(
            ACME,
            "t1",
            "t2",
            Some("find then email".to_string()),
            Some(serde_json::json!({"email": "to"})),
        )
        .await
        .unwrap();
    assert_eq!(rel.source_tool_id, acme.t1.id);
    assert_eq!(rel.target_tool_id, acme.t2.id);

    let edges = acme
        .graph
        .edges_among(EdgeKind::NextTool, ACME, &["t1".to_string(), "t2".to_string()])
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
}

#[tokio::test]
async fn test_hierarchy_upserts_embed_and_link() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let domain = registry
        .upsert_domain(Domain::new("support", ACME).with_description("Customer support"))
        .await
        .unwrap();
    assert!(domain.embedding.is_some());

    let capability = registry
        .upsert_capability(
            Capability::new("tickets", ACME),
            &["support".to_string(), "ghost".to_string()],
        )
        .await
        .unwrap();
    assert!(capability.embedding.is_some());
    assert_eq!(
        acme.store.domain_capability_names(ACME, "support").await.unwrap(),
        vec!["tickets"]
    );
    assert!(!registry
        .link_domain_capability(ACME, "ghost", "tickets")
        .await
        .unwrap());

    assert!(registry.delete_capability(ACME, "tickets").await.unwrap());
    assert!(registry.delete_domain(ACME, "support").await.unwrap());
    assert!(!registry.delete_domain(ACME, "support").await.unwrap());
}

#[tokio::test]
async fn test_workflow_upsert_keeps_known_links() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let mut workflow = Workflow::new("onboard", ACME);
    workflow.steps = vec![
        WorkflowStep {
            step_index: 1,
            name: "follow_up".to_string(),
            intent: None,
            domains: vec!["sales".to_string()],
            capabilities: vec!["ghost".to_string()],
        },
        WorkflowStep {
            step_index: 0,
            name: "capture".to_string(),
            intent: Some("capture the lead".to_string()),
            domains: vec![],
            capabilities: vec!["leads".to_string()],
        },
    ];

    let stored = registry.upsert_workflow(&workflow).await.unwrap();

    assert_eq!(stored.steps.len(), 2);
    assert_eq!(stored.steps[0].name, "capture");
    assert_eq!(stored.steps[1].domains, vec!["sales"]);
    assert!(stored.steps[1].capabilities.is_empty());
    let workflow_node = project::key(NodeLabel::Workflow, "onboard", ACME);
    assert!(acme.graph.node(&workflow_node).await.unwrap().is_some());
}

#[tokio::test]
async fn test_system_tool_registration_is_visible_to_everyone() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    registry
        .register_tool(Tool::new("whoami", ACME, "Describe the caller").system(), &[])
        .await
        .unwrap();

    let results = registry
        .search_mcp_tools(&acme_request().with_agent("carol"))
        .await
        .unwrap();
    assert_eq!(names(&results), vec!["sys1", "whoami"]);
    assert!(results.iter().all(|r| r.tool_type == ToolType::System));
}

#[tokio::test]
async fn test_application_links_require_the_tool() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    assert!(registry
        .link_application_tool(ACME, "crm", acme.t1.id)
        .await
        .unwrap());
    assert!(!registry
        .link_application_tool(ACME, "crm", quiver_core::new_tool_id())
        .await
        .unwrap());
}
