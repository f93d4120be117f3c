//! The registry handle shared by every operation

use crate::config::QuiverConfig;
use quiver_core::{LlmError, QuiverError, QuiverResult, SearchConfig};
use quiver_graph::GraphMirror;
use quiver_llm::{ChainAnalyst, EmbeddingProvider};
use quiver_pg::PgStore;
use quiver_storage::EntityStore;
use std::sync::Arc;

/// Entry point for tool search, registry writes and skill inference.
///
/// Every operation commits to the entity store first and mirrors into the
/// graph second. Collaborators are injected so tests can swap in
/// `MockStorage`, `InMemoryGraph` and the mock LLM providers.
#[derive(Clone)]
pub struct Registry {
    pub(crate) store: Arc<dyn EntityStore>,
    pub(crate) mirror: GraphMirror,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) analyst: Option<Arc<dyn ChainAnalyst>>,
    pub(crate) search: SearchConfig,
}

impl Registry {
    pub fn new(
        store: Arc<dyn EntityStore>,
        mirror: GraphMirror,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            mirror,
            embedder,
            analyst: None,
            search: SearchConfig::default(),
        }
    }

    pub fn with_analyst(mut self, analyst: Arc<dyn ChainAnalyst>) -> Self {
        self.analyst = Some(analyst);
        self
    }

    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Build a registry over PostgreSQL and Neo4j, migrating the schema.
    pub async fn connect(config: &QuiverConfig) -> QuiverResult<Self> {
        config.validate()?;
        let store = PgStore::from_config(&config.db)?;
        store.migrate().await?;
        let mirror = config.graph.build_mirror()?;
        let embedder = config.embedding.build()?;
        tracing::info!(
            db = ?config.db,
            graph = ?config.graph,
            "Registry connected"
        );
        Ok(Self::new(Arc::new(store), mirror, embedder).with_search_config(config.search.clone()))
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn mirror(&self) -> &GraphMirror {
        &self.mirror
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub(crate) fn analyst(&self) -> QuiverResult<&Arc<dyn ChainAnalyst>> {
        self.analyst
            .as_ref()
            .ok_or(QuiverError::Llm(LlmError::ProviderNotConfigured))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("embedder", &self.embedder.model_id())
            .field("analyst", &self.analyst.is_some())
            .field("strict_mirror", &self.mirror.is_strict())
            .field("search", &self.search)
            .finish()
    }
}
