//! Property-based tests for skill storage
//!
//! **Chain uniqueness**: ingesting the same ordered tool chain twice, under
//! any names, leaves exactly one skill row for it.
//!
//! **Cascade completeness**: deleting a tool removes every skill it alone
//! made up, with their capability and step rows, and trims it out of the
//! chains it shared.

use std::collections::HashSet;

use proptest::prelude::*;
use quiver_core::{Skill, Tool, ToolType};
use quiver_storage::EntityStore;
use quiver_test_utils::fixtures::Acme;
use quiver_test_utils::generators::arb_tool_name;
use quiver_test_utils::ACME;
use tokio::runtime::Runtime;

#[path = "support/registry.rs"]
mod test_registry_support;
use test_registry_support::test_registry;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

/// Five extra general tools p0..p4.
async fn pool(acme: &Acme) -> Result<Vec<Tool>, TestCaseError> {
    let mut tools = Vec::new();
    for i in 0..5 {
        let tool = acme
            .add_tool(&format!("p{}", i), &format!("pool tool {}", i), ToolType::General)
            .await
            .map_err(fail)?;
        tools.push(tool);
    }
    Ok(tools)
}

fn skill_over(name: &str, tools: &[Tool], chain: &[usize]) -> Skill {
    chain.iter().fold(Skill::new(name, ACME), |skill, &i| {
        skill.with_step(tools[i].name.clone(), None)
    })
}

fn arb_chain() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..5, 1..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_same_chain_keeps_one_skill(
        chain in arb_chain(),
        first in arb_tool_name(),
        second in arb_tool_name(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let acme = Acme::seed().await.map_err(fail)?;
            let tools = pool(&acme).await?;
            let registry = test_registry(&acme);

            let a = registry
                .ingest_skill(skill_over(&first, &tools, &chain), &["leads".to_string()])
                .await
                .map_err(fail)?;
            let b = registry
                .ingest_skill(skill_over(&second, &tools, &chain), &[])
                .await
                .map_err(fail)?;

            prop_assert_eq!(&a.skill, &b.skill);
            prop_assert!(!b.created);
            prop_assert_eq!(acme.store.skill_count(ACME).map_err(fail)?, 1);

            let steps = acme
                .store
                .tool_skill_list(ACME)
                .await
                .map_err(fail)?
                .into_iter()
                .filter(|ts| ts.skill_name == a.skill)
                .count();
            prop_assert_eq!(steps, chain.len());
            Ok(())
        })?;
    }

    #[test]
    fn prop_tool_delete_cascades(
        chains in prop::collection::vec(arb_chain(), 1..5),
        victim in 0usize..5,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let acme = Acme::seed().await.map_err(fail)?;
            let tools = pool(&acme).await?;
            let registry = test_registry(&acme);

            let mut skills = Vec::new();
            for (i, chain) in chains.iter().enumerate() {
                let report = registry
                    .ingest_skill(skill_over(&format!("s{}", i), &tools, chain), &["leads".to_string()])
                    .await
                    .map_err(fail)?;
                skills.push((report.skill, chain.clone()));
            }
            let victim_id = tools[victim].id;

            let deletion = registry
                .delete_tool(ACME, victim_id)
                .await
                .map_err(fail)?
                .ok_or_else(|| fail("tool vanished before delete"))?;

            let removed: HashSet<&String> = deletion.removed_skills.iter().collect();
            let trimmed: HashSet<&String> = deletion.trimmed_skills.iter().collect();
            let capability_skills = acme.store.capability_skill_list(ACME).await.map_err(fail)?;
            let steps = acme.store.tool_skill_list(ACME).await.map_err(fail)?;

            prop_assert!(steps.iter().all(|ts| ts.tool_id != victim_id));
            for (name, chain) in &skills {
                let uses_victim = chain.contains(&victim);
                let only_victim = chain.iter().all(|&i| i == victim);
                let stored = acme.store.skill_get(ACME, name).await.map_err(fail)?;
                if only_victim {
                    prop_assert!(removed.contains(name));
                    prop_assert!(stored.is_none());
                    prop_assert!(capability_skills.iter().all(|cs| &cs.skill_name != name));
                    prop_assert!(steps.iter().all(|ts| &ts.skill_name != name));
                } else {
                    prop_assert!(stored.is_some());
                    let remaining = steps.iter().filter(|ts| &ts.skill_name == name).count();
                    let expected = chain.iter().filter(|&&i| i != victim).count();
                    prop_assert_eq!(remaining, expected);
                    prop_assert_eq!(trimmed.contains(name), uses_victim);
                }
            }
            Ok(())
        })?;
    }
}
