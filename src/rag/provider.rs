//! Embedding provider abstraction (§4.F): anything that can turn text into
//! fixed-width vectors, swappable between a deterministic test double and a
//! real model-backed provider without the orchestrator knowing the
//! difference.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::Result;

/// A source of text embeddings. One instance is bound to a vector field via
/// its `provider_id`/`model` (§3 VectorField) and is shared across every
/// embedding job and `QueryRAG` call that targets that field.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}

/// Deterministic stand-in requiring no network access or model download:
/// derives a stable pseudo-random unit vector from a hash of the input
/// text. The default provider when a vector field names no `provider_id`.
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0;
            vector.push(unit);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(feature = "local-embeddings")]
mod fastembed_provider {
    use super::*;
    use crate::rag::embeddings::EmbeddingService;

    /// Wraps the fastembed-backed `EmbeddingService` behind the provider
    /// trait boundary, for vector fields configured with a real ONNX model.
    pub struct FastEmbedProvider {
        service: EmbeddingService,
    }

    impl FastEmbedProvider {
        pub fn new(service: EmbeddingService) -> Self {
            Self { service }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedProvider {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            self.service.embed_text(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let owned: Vec<String> = texts.to_vec();
            self.service.embed_texts(&owned).await
        }

        fn dimensions(&self) -> usize {
            self.service.dimensions()
        }
    }
}

#[cfg(feature = "local-embeddings")]
pub use fastembed_provider::FastEmbedProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_provider_is_deterministic_and_normalized() {
        let provider = HashEmbeddingProvider::new(16);
        let a = provider.embed_one("hello world").await.unwrap();
        let b = provider.embed_one("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn hash_provider_differs_across_inputs() {
        let provider = HashEmbeddingProvider::new(8);
        let a = provider.embed_one("alpha").await.unwrap();
        let b = provider.embed_one("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embed_batch_matches_embed_one_per_item() {
        let provider = HashEmbeddingProvider::new(8);
        let batch = provider
            .embed_batch(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        let single_x = provider.embed_one("x").await.unwrap();
        assert_eq!(batch[0], single_x);
    }
}
