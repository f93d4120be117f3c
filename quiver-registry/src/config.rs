//! Aggregate configuration for a registry process

use quiver_core::{QuiverResult, SearchConfig};
use quiver_graph::GraphConfig;
use quiver_llm::EmbeddingConfig;
use quiver_pg::DbConfig;

/// Every knob a registry process reads at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct QuiverConfig {
    pub db: DbConfig,
    pub graph: GraphConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

impl Default for QuiverConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            graph: GraphConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl QuiverConfig {
    /// Read `QUIVER_DB_*`, `QUIVER_GRAPH_*`, `QUIVER_EMBEDDING_*` and
    /// `QUIVER_SEARCH_*`. Fails only on an unsupported embedding provider.
    pub fn from_env() -> QuiverResult<Self> {
        Ok(Self {
            db: DbConfig::from_env(),
            graph: GraphConfig::from_env(),
            embedding: EmbeddingConfig::from_env()?,
            search: SearchConfig::from_env(),
        })
    }

    pub fn validate(&self) -> QuiverResult<()> {
        self.db.validate()?;
        self.graph.validate()?;
        self.embedding.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::{ConfigError, QuiverError};

    #[test]
    fn test_default_is_valid() {
        assert!(QuiverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_bad_section() {
        let mut config = QuiverConfig::default();
        config.search.default_k = 0;
        assert!(matches!(
            config.validate(),
            Err(QuiverError::Config(ConfigError::InvalidValue { field, .. })) if field == "default_k"
        ));

        let mut config = QuiverConfig::default();
        config.graph.uri = "bolt://localhost:7687".to_string();
        assert!(config.validate().is_err());
    }
}
