use std::sync::Arc;

use quiver_llm::{ChainAnalyst, MockChainAnalyst};
use quiver_registry::{Registry, SearchRequest, ToolSearchResult};
use quiver_test_utils::fixtures::Acme;
use quiver_test_utils::ACME;

/// Registry over the fixture's store, graph and embedder, without analyst.
pub fn test_registry(acme: &Acme) -> Registry {
    Registry::new(
        Arc::new(acme.store.clone()),
        acme.mirror(),
        acme.embedder.clone(),
    )
}

pub fn test_registry_with_analyst(acme: &Acme, analyst: MockChainAnalyst) -> Registry {
    let analyst: Arc<dyn ChainAnalyst> = Arc::new(analyst);
    test_registry(acme).with_analyst(analyst)
}

pub fn acme_request() -> SearchRequest {
    SearchRequest::new(ACME)
}

pub fn names(results: &[ToolSearchResult]) -> Vec<String> {
    let mut names: Vec<String> = results.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}
