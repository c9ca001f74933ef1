use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Turns text into a fixed-length vector.
///
/// Every vector returned by one embedder has length [`Embedder::dimensions`];
/// an index must only ever be fed by embedders of the same dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Embedder backed by the OpenAI embeddings endpoint.
#[derive(Clone)]
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.model, text_len = text.len(), "requesting embedding");

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| RagError::embedding("openai", e))?;

        let response = self.client.embeddings().create(request).await.map_err(|e| {
            error!(model = %self.model, error = %e, "embedding request failed");
            RagError::embedding("openai", e)
        })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| RagError::embedding("openai", "no embedding returned"))?;

        if embedding.len() != self.dimensions {
            return Err(RagError::embedding(
                "openai",
                format!(
                    "embedding has wrong size: {} (expected {})",
                    embedding.len(),
                    self.dimensions
                ),
            ));
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Offline feature-hashing embedder.
///
/// Lower-cased alphanumeric tokens are hashed (FNV-1a) into `dimensions` buckets and
/// the result is L2-normalised, so texts sharing words score high under cosine
/// similarity. Deterministic across runs and processes.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

fn fnv1a(token: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    token.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedding_has_fixed_dimension() {
        let embedder = HashEmbedder::new(64);
        let vector = embedder.embed("The President is the head of state.").await.unwrap();
        assert_eq!(vector.len(), 64);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedding_is_deterministic_and_case_insensitive() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("Fundamental Rights").await.unwrap();
        let b = embedder.embed("fundamental rights").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embedding_of_blank_text_is_zero() {
        let embedder = HashEmbedder::new(8);
        let vector = embedder.embed("  ...  ").await.unwrap();
        assert!(vector.iter().all(|&x| x == 0.0));
    }
}
