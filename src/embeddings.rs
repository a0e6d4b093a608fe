//! Embedding backend seam.
//!
//! The actual model is explicitly out of scope (spec §1): the engine only
//! defines the trait boundary and ships one deterministic implementation
//! for tests and examples. Grounded on the teacher's `embeddings/local.rs`
//! (`Embedding` wrapper, `cosine_similarity`/`euclidean_distance` free
//! functions) with the global singleton replaced by constructor injection.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Failure from an embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("text exceeds max token budget")]
    TooLong,
}

/// `text -> R^d`, injected into the global layer at construction so tests
/// can substitute a deterministic embedder (spec §9).
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn dimension(&self) -> usize;
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for
/// a zero-magnitude vector rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// A stable, deterministic, NOT semantically meaningful embedder.
///
/// Hashes overlapping word shingles into a fixed-dimension vector, then
/// normalizes it. Two texts sharing more words land closer together than
/// two unrelated texts, which is enough for the engine's own tests
/// without depending on a real model.
#[derive(Debug, Clone)]
pub struct DeterministicHashEmbedder {
    dimension: usize,
}

impl DeterministicHashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for DeterministicHashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dimension;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.1, 0.2, 0.3, 0.4];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn hash_embedder_produces_requested_dimension() {
        let embedder = DeterministicHashEmbedder::new(16);
        let v = embedder.embed("hello world").unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(embedder.dimension(), 16);
    }

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = DeterministicHashEmbedder::new(32);
        let a = embedder.embed("auth vulnerability detected").unwrap();
        let b = embedder.embed("auth vulnerability detected").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated() {
        let embedder = DeterministicHashEmbedder::new(64);
        let base = embedder.embed("critical security vulnerability in auth flow").unwrap();
        let similar = embedder.embed("security vulnerability in the auth flow").unwrap();
        let unrelated = embedder.embed("lunch menu for the cafeteria today").unwrap();
        assert!(cosine_similarity(&base, &similar) > cosine_similarity(&base, &unrelated));
    }
}
