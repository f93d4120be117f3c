//! HTTP embedding providers

mod ollama;
mod openai;

pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAIEmbeddingProvider;

use quiver_core::{EmbeddingVector, LlmError, QuiverError, VectorError};

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> QuiverError {
    QuiverError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> QuiverError {
    QuiverError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> QuiverError {
    QuiverError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

/// Reject vectors whose length differs from the configured dimensions.
pub(crate) fn check_dimensions(
    vector: EmbeddingVector,
    expected: i32,
) -> Result<EmbeddingVector, QuiverError> {
    if vector.dimensions != expected {
        return Err(QuiverError::Vector(VectorError::DimensionMismatch {
            expected,
            got: vector.dimensions,
        }));
    }
    Ok(vector)
}
