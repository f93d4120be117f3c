//! OpenAI-compatible embedding provider

use super::{check_dimensions, invalid_response, rate_limited, request_failed};
use crate::EmbeddingProvider;
use async_trait::async_trait;
use quiver_core::{EmbeddingVector, QuiverResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "openai";

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Embedding provider for the OpenAI `/embeddings` API or any server that
/// speaks it.
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: i32,
}

impl OpenAIEmbeddingProvider {
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://api.openai.com/v1"
    /// * `api_key` - bearer token
    /// * `model` - e.g. "text-embedding-3-small"
    /// * `dimensions` - requested output size
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
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
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        })
    }

    async fn request(&self, input: Vec<&str>) -> QuiverResult<Vec<EmbeddingVector>> {
        let expected = input.len();
        let body = EmbeddingRequest {
            model: &self.model,
            input,
            dimensions: Some(self.dimensions),
        };

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
                _ => request_failed(PROVIDER, status.as_u16() as i32, message),
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if parsed.data.len() != expected {
            return Err(invalid_response(
                PROVIDER,
                format!("Expected {} embeddings but got {}", expected, parsed.data.len()),
            ));
        }

        parsed.data.sort_by_key(|d| d.index);
        parsed
            .data
            .into_iter()
            .map(|d| check_dimensions(EmbeddingVector::new(d.embedding, self.model.clone()), self.dimensions))
            .collect()
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> QuiverResult<EmbeddingVector> {
        self.request(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response(PROVIDER, "No embedding data in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> QuiverResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.to_vec()).await
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(1500));
        assert_eq!(parse_retry_after_ms(&HeaderMap::new()), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = OpenAIEmbeddingProvider::new(
            "https://api.openai.com/v1/",
            "sk-secret",
            "text-embedding-3-small",
            1536,
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("https://api.openai.com/v1\""));
    }

    #[test]
    fn test_request_body_shape() {
        let body = EmbeddingRequest {
            model: "m",
            input: vec!["hello"],
            dimensions: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"][0], "hello");
        assert!(json.get("dimensions").is_none());
    }
}
