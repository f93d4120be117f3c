//! Tool search over the acme fixture: agent constraints, role filters and
//! the system-tool bypass.

use quiver_core::{
    CapabilityFilter, DomainFilter, QuiverError, RegistryError, RoleFilter, SearchConfig,
    ToolFilter, ToolType,
};
use quiver_test_utils::assertions::assert_system_tools_lead;
use quiver_test_utils::fixtures::Acme;
use quiver_test_utils::ACME;

#[path = "support/registry.rs"]
mod test_registry_support;
use test_registry_support::{acme_request, names, test_registry};

fn leads_filter(skills: &[&str]) -> ToolFilter {
    let mut capability = CapabilityFilter::new("leads");
    for skill in skills {
        capability = capability.with_skill(*skill);
    }
    ToolFilter::new().with_role(
        RoleFilter::new("viewer").with_domain(DomainFilter::new("sales").with_capability(capability)),
    )
}

#[tokio::test]
async fn test_unconstrained_search_returns_every_tool() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let results = registry.search_mcp_tools(&acme_request()).await.unwrap();

    assert_eq!(names(&results), vec!["sys1", "t1", "t2"]);
    assert_eq!(results[0].name, "sys1");
    assert!(results.iter().all(|r| r.cosine_similarity.is_none()));
}

#[tokio::test]
async fn test_agent_sees_only_tools_reached_through_roles() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let results = registry
        .search_mcp_tools(&acme_request().with_agent("bob"))
        .await
        .unwrap();

    assert_eq!(names(&results), vec!["sys1", "t1"]);
}

#[tokio::test]
async fn test_agent_without_roles_gets_system_tools_only() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    for agent in ["carol", "nobody"] {
        let results = registry
            .search_mcp_tools(&acme_request().with_agent(agent))
            .await
            .unwrap();
        assert_eq!(names(&results), vec!["sys1"], "agent {}", agent);
    }
}

#[tokio::test]
async fn test_skill_filter_without_wiring_falls_back_to_system_tools() {
    let acme = Acme::seed().await.unwrap();
    acme.add_qualify_lead().await.unwrap();
    let registry = test_registry(&acme);

    let results = registry
        .search_mcp_tools(&acme_request().with_filter(leads_filter(&["qualify_lead"])))
        .await
        .unwrap();

    assert_eq!(names(&results), vec!["sys1"]);
}

#[tokio::test]
async fn test_skill_filter_reaches_tools_through_tool_skills() {
    let acme = Acme::seed().await.unwrap();
    acme.add_email_skills().await.unwrap();
    let registry = test_registry(&acme);

    let results = registry
        .search_mcp_tools(&acme_request().with_filter(leads_filter(&["send_and_log"])))
        .await
        .unwrap();
    assert_eq!(names(&results), vec!["sys1", "t1", "t2"]);

    let results = registry
        .search_mcp_tools(&acme_request().with_filter(leads_filter(&["draft_email"])))
        .await
        .unwrap();
    assert_eq!(names(&results), vec!["sys1", "t1"]);
}

#[tokio::test]
async fn test_role_only_filter_expands_to_granted_domains() {
    let acme = Acme::seed().await.unwrap();
    acme.add_email_skills().await.unwrap();
    let registry = test_registry(&acme);

    let filter = ToolFilter::new().with_role(RoleFilter::new("viewer"));
    let results = registry
        .search_mcp_tools(&acme_request().with_filter(filter))
        .await
        .unwrap();

    // t2 is reached through send_and_log under "leads"
    assert_eq!(names(&results), vec!["sys1", "t1", "t2"]);
}

#[tokio::test]
async fn test_filter_is_intersected_with_agent_tools() {
    let acme = Acme::seed().await.unwrap();
    acme.add_email_skills().await.unwrap();
    let registry = test_registry(&acme);

    // bob's agent path uses CapabilityTool only, so t2 stays hidden
    let request = acme_request()
        .with_agent("bob")
        .with_filter(leads_filter(&["send_and_log"]));
    let results = registry.search_mcp_tools(&request).await.unwrap();

    assert_eq!(names(&results), vec!["sys1", "t1"]);
}

#[tokio::test]
async fn test_domain_not_granted_to_role_is_ignored() {
    let acme = Acme::seed().await.unwrap();
    acme.add_billing().await.unwrap();
    let registry = test_registry(&acme);

    let filter = ToolFilter::new()
        .with_role(RoleFilter::new("viewer").with_domain(DomainFilter::new("finance")));
    let results = registry
        .search_mcp_tools(&acme_request().with_filter(filter))
        .await
        .unwrap();

    assert_eq!(names(&results), vec!["sys1"]);
}

#[tokio::test]
async fn test_query_ranks_general_tools_and_respects_k() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let request = acme_request()
        .with_query("Send an email message to a contact")
        .with_k(1);
    let results = registry.search_mcp_tools(&request).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "sys1");
    assert!(results[0].cosine_similarity.is_none());
    assert_eq!(results[1].name, "t2");
    let similarity = results[1].cosine_similarity.unwrap();
    assert!((similarity - 1.0).abs() < 1e-4, "similarity {}", similarity);
}

#[tokio::test]
async fn test_k_above_max_is_clamped() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme).with_search_config(SearchConfig {
        default_k: 1,
        max_k: 1,
    });

    let request = acme_request().with_query("Send an email message").with_k(10);
    let results = registry.search_mcp_tools(&request).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "sys1");
}

#[tokio::test]
async fn test_blank_query_falls_back_to_listing() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let results = registry
        .search_mcp_tools(&acme_request().with_query("   ").with_k(1))
        .await
        .unwrap();

    assert_eq!(names(&results), vec!["sys1", "t1", "t2"]);
}

#[tokio::test]
async fn test_filter_query_used_when_request_has_none() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let request = acme_request()
        .with_filter(ToolFilter::new().with_query("Find a sales lead by email address"))
        .with_k(1);
    let results = registry.search_mcp_tools(&request).await.unwrap();

    assert_eq!(results[1].name, "t1");
    assert!(results[1].cosine_similarity.is_some());
}

#[tokio::test]
async fn test_zero_k_is_rejected() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);

    let result = registry.search_mcp_tools(&acme_request().with_k(0)).await;

    assert!(matches!(
        result,
        Err(QuiverError::Registry(RegistryError::InvalidLimit { requested: 0 }))
    ));
}

#[tokio::test]
async fn test_system_tools_lead_results() {
    let acme = Acme::seed().await.unwrap();
    acme.add_tool("sys2", "Describe the caller", ToolType::System)
        .await
        .unwrap();
    let registry = test_registry(&acme);

    let results = registry
        .search_mcp_tools(&acme_request().with_query("lead"))
        .await
        .unwrap();

    let types: Vec<ToolType> = results.iter().map(|r| r.tool_type).collect();
    let ids: Vec<_> = results.iter().map(|r| r.id).collect();
    assert_system_tools_lead(&types, &ids, &[acme.sys1.id]);
    assert_eq!(types.iter().filter(|t| t.is_system()).count(), 2);
}

#[tokio::test]
async fn test_other_tenant_tools_never_leak() {
    let acme = Acme::seed().await.unwrap();
    let registry = test_registry(&acme);
    registry
        .register_tool(quiver_core::Tool::new("t1", "globex", "Globex lead lookup"), &[])
        .await
        .unwrap();

    let results = registry.search_mcp_tools(&acme_request()).await.unwrap();

    assert!(results.iter().all(|r| r.tenant == ACME));
    assert_eq!(results.len(), 3);
}
