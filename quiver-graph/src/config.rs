//! Graph connection configuration

use crate::mirror::GraphMirror;
use crate::neo4j::Neo4jHttpGraph;
use quiver_core::{ConfigError, QuiverError, QuiverResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_URI: &str = "http://localhost:7474";
const DEFAULT_USER: &str = "neo4j";
const DEFAULT_DATABASE: &str = "neo4j";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How to reach the graph database and how hard to fail when it misbehaves.
#[derive(Clone, PartialEq)]
pub struct GraphConfig {
    /// HTTP root of the Neo4j server.
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub timeout: Duration,
    /// Surface non-recoverable mirror errors to callers instead of logging them.
    pub strict: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            strict: false,
        }
    }
}

impl GraphConfig {
    /// Create GraphConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `QUIVER_GRAPH_URI`: HTTP endpoint (default: http://localhost:7474)
    /// - `QUIVER_GRAPH_USER`: user (default: neo4j)
    /// - `QUIVER_GRAPH_PASSWORD`: password (default: empty)
    /// - `QUIVER_GRAPH_DATABASE`: database name (default: neo4j)
    /// - `QUIVER_GRAPH_TIMEOUT_SECS`: request timeout (default: 10)
    /// - `QUIVER_GRAPH_STRICT`: "true" or "1" to propagate mirror errors (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uri: std::env::var("QUIVER_GRAPH_URI").unwrap_or(defaults.uri),
            user: std::env::var("QUIVER_GRAPH_USER").unwrap_or(defaults.user),
            password: std::env::var("QUIVER_GRAPH_PASSWORD").unwrap_or(defaults.password),
            database: std::env::var("QUIVER_GRAPH_DATABASE").unwrap_or(defaults.database),
            timeout: std::env::var("QUIVER_GRAPH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            strict: std::env::var("QUIVER_GRAPH_STRICT")
                .ok()
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.strict),
        }
    }

    pub fn validate(&self) -> QuiverResult<()> {
        if !(self.uri.starts_with("http://") || self.uri.starts_with("https://")) {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "uri".to_string(),
                value: self.uri.clone(),
                reason: "graph uri must be an http(s) endpoint".to_string(),
            }));
        }

        if self.database.trim().is_empty() {
            return Err(QuiverError::Config(ConfigError::MissingRequired {
                field: "database".to_string(),
            }));
        }

        if self.timeout.is_zero() {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: format!("{:?}", self.timeout),
                reason: "timeout must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }

    /// Transaction endpoint for this database.
    pub fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.uri.trim_end_matches('/'),
            self.database
        )
    }

    /// Validate and build a mirror over the Neo4j HTTP endpoint.
    pub fn build_mirror(&self) -> QuiverResult<GraphMirror> {
        self.validate()?;
        let graph = Neo4jHttpGraph::new(self)?;
        tracing::info!(
            uri = %self.uri,
            database = %self.database,
            strict = self.strict,
            "Graph mirror configured"
        );
        Ok(GraphMirror::new(Arc::new(graph)).with_strict(self.strict))
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .field("strict", &self.strict)
            .finish()
    }
}
