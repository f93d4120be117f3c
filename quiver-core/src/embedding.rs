//! Embedding vector operations

use crate::{QuiverError, QuiverResult, VectorError};
use serde::{Deserialize, Serialize};

/// Embedding vector with dynamic dimensions.
/// Supports any embedding model dimension (e.g., 384, 768, 1536, 3072).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    /// The embedding data as a vector of f32 values.
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
    /// Number of dimensions (must match data.len()).
    pub dimensions: i32,
}

impl EmbeddingVector {
    /// Create a new embedding vector.
    pub fn new(data: Vec<f32>, model_id: impl Into<String>) -> Self {
        let dimensions = data.len() as i32;
        Self {
            data,
            model_id: model_id.into(),
            dimensions,
        }
    }

    /// Compute cosine similarity between two embedding vectors.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> QuiverResult<f32> {
        if self.dimensions != other.dimensions {
            return Err(QuiverError::Vector(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: other.dimensions,
            }));
        }

        let mut dot_product = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot_product += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot_product / (norm_a * norm_b))
    }

    /// Cosine distance (`1 - similarity`), the ordering key of nearest-neighbour search.
    /// Matches pgvector's `<=>` operator.
    pub fn cosine_distance(&self, other: &EmbeddingVector) -> QuiverResult<f32> {
        Ok(1.0 - self.cosine_similarity(other)?)
    }

    /// Check if this vector has valid dimensions.
    pub fn is_valid(&self) -> bool {
        self.dimensions > 0 && self.data.len() == self.dimensions as usize
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_dimensions() {
        let data = vec![0.0, 1.0, 0.5];
        let vec = EmbeddingVector::new(data.clone(), "model");
        assert_eq!(vec.dimensions, data.len() as i32);
        assert_eq!(vec.data, data);
        assert_eq!(vec.model_id, "model");
    }

    #[test]
    fn test_empty_vector_is_invalid() {
        let vec = EmbeddingVector::new(vec![], "model");
        assert_eq!(vec.dimensions, 0);
        assert!(!vec.is_valid());
    }

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        let a = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "model");
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "model");
        let sim = a.cosine_similarity(&b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal_vectors() {
        let a = EmbeddingVector::new(vec![1.0, 0.0], "model");
        let b = EmbeddingVector::new(vec![0.0, 1.0], "model");
        let dist = a.cosine_distance(&b).unwrap();
        assert!((dist - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector_returns_zero() {
        let a = EmbeddingVector::new(vec![0.0, 0.0], "model");
        let b = EmbeddingVector::new(vec![1.0, 0.0], "model");
        assert_eq!(a.cosine_similarity(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let a = EmbeddingVector::new(vec![1.0, 0.0], "model");
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0], "model");
        let err = a.cosine_similarity(&b).unwrap_err();
        assert!(matches!(
            err,
            QuiverError::Vector(VectorError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }
}
