//! Search configuration

use crate::{ConfigError, QuiverError, QuiverResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_K: usize = 10;
pub const DEFAULT_SEARCH_MAX_K: usize = 200;

/// Limits applied to the vector path of tool search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result cap when the caller gives none.
    pub default_k: usize,
    /// Upper bound; larger requests are clamped.
    pub max_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_SEARCH_K,
            max_k: DEFAULT_SEARCH_MAX_K,
        }
    }
}

impl SearchConfig {
    /// Create SearchConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `QUIVER_SEARCH_DEFAULT_K`: result cap when none is requested (default: 10)
    /// - `QUIVER_SEARCH_MAX_K`: hard upper bound on k (default: 200)
    pub fn from_env() -> Self {
        let default_k = std::env::var("QUIVER_SEARCH_DEFAULT_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEARCH_K);

        let max_k = std::env::var("QUIVER_SEARCH_MAX_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEARCH_MAX_K);

        Self { default_k, max_k }
    }

    pub fn validate(&self) -> QuiverResult<()> {
        if self.default_k == 0 {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "default_k".to_string(),
                value: self.default_k.to_string(),
                reason: "default_k must be greater than 0".to_string(),
            }));
        }

        if self.max_k < self.default_k {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "max_k".to_string(),
                value: self.max_k.to_string(),
                reason: "max_k must be at least default_k".to_string(),
            }));
        }

        Ok(())
    }

    /// Effective k for a request.
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_k).min(self.max_k)
    }

    /// Whether `requested` exceeds the upper bound and will be cut down.
    pub fn clamps(&self, requested: Option<usize>) -> bool {
        requested.is_some_and(|k| k > self.max_k)
    }
}
