//! Property-based tests for tool search
//!
//! **Monotonic narrowing**: for any agent and filter, the tools visible under
//! the agent alone are a superset of those visible once the filter is added.
//!
//! **System-tool invariance**: every system tool of the tenant is returned
//! for any agent, filter and query, including ones that resolve to nothing.

use std::collections::HashSet;

use proptest::prelude::*;
use quiver_core::{Role, RoleAgent, RoleDomain, ToolId, ToolType};
use quiver_registry::{Registry, SearchRequest};
use quiver_storage::EntityStore;
use quiver_test_utils::fixtures::Acme;
use quiver_test_utils::generators::{arb_agent_id, arb_tool_filter};
use quiver_test_utils::ACME;
use tokio::runtime::Runtime;

#[path = "support/registry.rs"]
mod test_registry_support;
use test_registry_support::test_registry;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

/// The acme fixture with every add-on, plus role "editor" over sales and
/// finance held by bob.
async fn rich_acme() -> Result<(Acme, Registry), TestCaseError> {
    let acme = Acme::seed().await.map_err(fail)?;
    acme.add_email_skills().await.map_err(fail)?;
    acme.add_qualify_lead().await.map_err(fail)?;
    acme.add_billing().await.map_err(fail)?;
    acme.add_tool("sys2", "Describe the caller", ToolType::System)
        .await
        .map_err(fail)?;

    acme.store
        .role_upsert(&Role {
            name: "editor".to_string(),
            tenant_name: ACME.to_string(),
            role_type: None,
        })
        .await
        .map_err(fail)?;
    for domain in ["sales", "finance"] {
        acme.store
            .role_domain_link(&RoleDomain {
                tenant_name: ACME.to_string(),
                role_name: "editor".to_string(),
                domain_name: domain.to_string(),
            })
            .await
            .map_err(fail)?;
    }
    acme.store
        .role_agent_link(&RoleAgent {
            tenant_name: ACME.to_string(),
            role_name: "editor".to_string(),
            agent_id: "bob".to_string(),
        })
        .await
        .map_err(fail)?;

    let registry = test_registry(&acme);
    Ok((acme, registry))
}

fn request(agent: &Option<String>) -> SearchRequest {
    let mut request = SearchRequest::new(ACME);
    request.agent_id = agent.clone();
    request
}

async fn visible(registry: &Registry, request: &SearchRequest) -> Result<HashSet<ToolId>, TestCaseError> {
    Ok(registry
        .search_mcp_tools(request)
        .await
        .map_err(fail)?
        .into_iter()
        .map(|r| r.id)
        .collect())
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Adding a filter never widens what an agent (or no agent) can see.
    #[test]
    fn prop_filter_narrows_agent_results(
        agent in arb_agent_id(),
        filter in arb_tool_filter(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (_acme, registry) = rich_acme().await?;

            let base = visible(&registry, &request(&agent)).await?;
            let narrowed = visible(&registry, &request(&agent).with_filter(filter.clone())).await?;

            prop_assert!(
                narrowed.is_subset(&base),
                "filter {:?} widened results for agent {:?}",
                filter,
                agent
            );
            Ok(())
        })?;
    }

    /// System tools are always present and always first.
    #[test]
    fn prop_system_tools_always_returned(
        agent in arb_agent_id(),
        filter in proptest::option::of(arb_tool_filter()),
        query in proptest::option::of(prop_oneof![
            Just("email".to_string()),
            Just("billing step a".to_string()),
            Just(String::new()),
        ]),
        k in proptest::option::of(1usize..4),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (acme, registry) = rich_acme().await?;
            let system: Vec<ToolId> = acme
                .store
                .system_tools(ACME)
                .await
                .map_err(fail)?
                .into_iter()
                .map(|t| t.id)
                .collect();
            prop_assert_eq!(system.len(), 2);

            let mut req = request(&agent);
            req.filter = filter;
            req.tool_query = query;
            req.k = k;
            let results = registry.search_mcp_tools(&req).await.map_err(fail)?;

            let leading: HashSet<ToolId> = results
                .iter()
                .take(system.len())
                .map(|r| r.id)
                .collect();
            for id in &system {
                prop_assert!(leading.contains(id), "system tool {} missing or not first", id);
            }
            prop_assert!(results
                .iter()
                .skip(system.len())
                .all(|r| r.tool_type == ToolType::General));
            Ok(())
        })?;
    }
}
