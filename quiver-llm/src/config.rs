//! Embedding provider configuration

use crate::{EmbeddingProvider, MockEmbeddingProvider, OllamaEmbeddingProvider, OpenAIEmbeddingProvider};
use quiver_core::{ConfigError, QuiverError, QuiverResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
const DEFAULT_MOCK_MODEL: &str = "mock-embedding";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Mock,
    OpenAi,
    Ollama,
}

impl EmbeddingProviderKind {
    fn default_dimensions(&self) -> i32 {
        match self {
            EmbeddingProviderKind::Mock => 64,
            EmbeddingProviderKind::OpenAi => 1536,
            EmbeddingProviderKind::Ollama => 768,
        }
    }
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EmbeddingProviderKind::Mock => "mock",
            EmbeddingProviderKind::OpenAi => "openai",
            EmbeddingProviderKind::Ollama => "ollama",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EmbeddingProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(EmbeddingProviderKind::Mock),
            "openai" => Ok(EmbeddingProviderKind::OpenAi),
            "ollama" => Ok(EmbeddingProviderKind::Ollama),
            other => Err(ConfigError::ProviderNotSupported {
                provider: other.to_string(),
            }),
        }
    }
}

/// Which embedder to build and how to reach it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub endpoint: String,
    pub model: String,
    pub dimensions: i32,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Mock,
            endpoint: String::new(),
            model: DEFAULT_MOCK_MODEL.to_string(),
            dimensions: EmbeddingProviderKind::Mock.default_dimensions(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EmbeddingConfig {
    /// Create EmbeddingConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `QUIVER_EMBEDDING_PROVIDER`: mock, openai or ollama (default: mock)
    /// - `QUIVER_EMBEDDING_ENDPOINT`: API root (default depends on provider)
    /// - `QUIVER_EMBEDDING_MODEL`: model name (default depends on provider)
    /// - `QUIVER_EMBEDDING_DIMENSIONS`: vector size (default depends on provider)
    /// - `QUIVER_EMBEDDING_API_KEY`: bearer token, required for openai
    ///
    /// An unrecognised provider name is an error rather than a silent fallback.
    pub fn from_env() -> QuiverResult<Self> {
        let provider = match std::env::var("QUIVER_EMBEDDING_PROVIDER") {
            Ok(value) => value.parse::<EmbeddingProviderKind>()?,
            Err(_) => EmbeddingProviderKind::Mock,
        };

        let (default_endpoint, default_model) = match provider {
            EmbeddingProviderKind::Mock => ("", DEFAULT_MOCK_MODEL),
            EmbeddingProviderKind::OpenAi => (DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL),
            EmbeddingProviderKind::Ollama => (DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL),
        };

        let endpoint = std::env::var("QUIVER_EMBEDDING_ENDPOINT")
            .unwrap_or_else(|_| default_endpoint.to_string());
        let model = std::env::var("QUIVER_EMBEDDING_MODEL")
            .unwrap_or_else(|_| default_model.to_string());
        let dimensions = std::env::var("QUIVER_EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| provider.default_dimensions());
        let api_key = std::env::var("QUIVER_EMBEDDING_API_KEY").ok();

        Ok(Self {
            provider,
            endpoint,
            model,
            dimensions,
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn validate(&self) -> QuiverResult<()> {
        if self.dimensions <= 0 {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "dimensions".to_string(),
                value: self.dimensions.to_string(),
                reason: "dimensions must be greater than 0".to_string(),
            }));
        }

        if self.model.trim().is_empty() {
            return Err(QuiverError::Config(ConfigError::MissingRequired {
                field: "model".to_string(),
            }));
        }

        if self.provider != EmbeddingProviderKind::Mock && self.endpoint.trim().is_empty() {
            return Err(QuiverError::Config(ConfigError::MissingRequired {
                field: "endpoint".to_string(),
            }));
        }

        if self.provider == EmbeddingProviderKind::OpenAi && self.api_key.is_none() {
            return Err(QuiverError::Config(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            }));
        }

        Ok(())
    }

    /// Validate and build the configured provider.
    pub fn build(&self) -> QuiverResult<Arc<dyn EmbeddingProvider>> {
        self.validate()?;
        tracing::info!(
            provider = %self.provider,
            model = %self.model,
            dimensions = self.dimensions,
            "Embedding provider configured"
        );
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            EmbeddingProviderKind::Mock => {
                Arc::new(MockEmbeddingProvider::new(self.model.clone(), self.dimensions))
            }
            EmbeddingProviderKind::OpenAi => Arc::new(OpenAIEmbeddingProvider::new(
                self.endpoint.clone(),
                self.api_key.clone().unwrap_or_default(),
                self.model.clone(),
                self.dimensions,
                self.timeout,
            )?),
            EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::new(
                self.endpoint.clone(),
                self.model.clone(),
                self.dimensions,
                self.timeout,
            )?),
        };
        Ok(provider)
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
