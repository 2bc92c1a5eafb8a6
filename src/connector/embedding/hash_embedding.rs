use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;

use crate::application::EmbeddingClient;
use crate::domain::DomainError;

/// Deterministic local embedding: each text seeds a PRNG from its hash and
/// draws a unit vector. No model weights, but stable per input, which is
/// all the indexer's contract requires.
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|text| self.generate(text)).collect();
        debug!("Generated {} embeddings", vectors.len());
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_per_input() {
        let client = HashEmbedding::new();
        let a = client.embed_batch(&["hello world".to_string()]).await.unwrap();
        let b = client.embed_batch(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_dimensions() {
        let client = HashEmbedding::with_dimensions(128);
        let vectors = client.embed_batch(&["test".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 128);
    }

    #[tokio::test]
    async fn test_vectors_are_normalized() {
        let client = HashEmbedding::new();
        let vectors = client.embed_batch(&["test".to_string()]).await.unwrap();
        let magnitude: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_distinct_inputs_distinct_vectors() {
        let client = HashEmbedding::new();
        let vectors = client
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let client = HashEmbedding::new();
        let vectors = client.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
