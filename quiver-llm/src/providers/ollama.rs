//! Ollama embedding provider (local models)

use super::{check_dimensions, invalid_response, request_failed};
use crate::EmbeddingProvider;
use async_trait::async_trait;
use quiver_core::{EmbeddingVector, QuiverResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider for a local Ollama server.
#[derive(Debug)]
pub struct OllamaEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: i32,
}

impl OllamaEmbeddingProvider {
    /// # Arguments
    /// * `base_url` - server URL, e.g. "http://localhost:11434"
    /// * `model` - e.g. "nomic-embed-text"
    /// * `dimensions` - embedding size the model produces
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: i32,
        timeout: Duration,
    ) -> QuiverResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(PROVIDER, 0, format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> QuiverResult<EmbeddingVector> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(request_failed(PROVIDER, status.as_u16() as i32, error_text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        check_dimensions(
            EmbeddingVector::new(parsed.embedding, self.model.clone()),
            self.dimensions,
        )
    }

    async fn embed_batch(&self, texts: &[&str]) -> QuiverResult<Vec<EmbeddingVector>> {
        // No batch endpoint; one request per text.
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
