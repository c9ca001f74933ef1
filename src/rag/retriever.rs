use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::vector_db::VectorStore;
use crate::error::{RagError, Result};
use crate::llm::embeddings::Embedder;

/// Passages ranked by descending similarity to the query. May be empty.
pub type RetrievalResult = Vec<String>;

/// Looks up the stored passages most similar to a query.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    threshold: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            threshold: None,
        }
    }

    /// Drop hits scoring below `threshold`.
    pub fn with_threshold(mut self, threshold: Option<f32>) -> Self {
        self.threshold = threshold;
        self
    }

    /// Embed `query` and return the text of the `top_k` nearest entries.
    ///
    /// An embedding or index failure is returned as [`RagError::Retrieval`]; an empty
    /// result only ever means nothing matched.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RagError::Retrieval(format!("query embedding failed: {}", e)))?;

        let hits = self.store.query(&vector, top_k).await.map_err(|e| match e {
            RagError::Retrieval(msg) => RagError::Retrieval(msg),
            other => RagError::Retrieval(other.to_string()),
        })?;

        let total = hits.len();
        let passages: Vec<String> = hits
            .into_iter()
            .filter(|hit| self.threshold.map_or(true, |min| hit.score >= min))
            .filter_map(|hit| match hit.text() {
                Some(text) => Some(text.to_string()),
                None => {
                    warn!(id = %hit.id, backend = self.store.backend(), "index entry has no text, skipping");
                    None
                }
            })
            .collect();

        debug!(hits = total, passages = passages.len(), top_k, "retrieved context");
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::InMemoryVectorStore;
    use crate::database::vector_db::IndexEntry;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "east" => vec![1.0, 0.0],
                _ => vec![0.0, 1.0],
            })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::embedding("broken", "quota exceeded"))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn entry(id: &str, text: Option<&str>, vector: Vec<f32>) -> IndexEntry {
        let mut metadata = Map::new();
        if let Some(text) = text {
            metadata.insert("text".to_string(), Value::String(text.to_string()));
        }
        IndexEntry {
            id: id.to_string(),
            vector,
            metadata,
        }
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new(2));
        store
            .upsert(&[
                entry("a", Some("sunrise"), vec![1.0, 0.0]),
                entry("b", Some("polaris"), vec![0.0, 1.0]),
                entry("c", None, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_returns_text_in_rank_order_and_skips_textless() {
        let retriever = Retriever::new(Arc::new(AxisEmbedder), seeded_store().await);
        let passages = retriever.retrieve("east", 3).await.unwrap();
        assert_eq!(passages, vec!["sunrise".to_string(), "polaris".to_string()]);
    }

    #[tokio::test]
    async fn test_threshold_filters_weak_hits() {
        let retriever =
            Retriever::new(Arc::new(AxisEmbedder), seeded_store().await).with_threshold(Some(0.5));
        let passages = retriever.retrieve("east", 3).await.unwrap();
        assert_eq!(passages, vec!["sunrise".to_string()]);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_error() {
        let retriever = Retriever::new(Arc::new(BrokenEmbedder), seeded_store().await);
        let err = retriever.retrieve("anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval(msg) if msg.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_result() {
        let retriever = Retriever::new(Arc::new(AxisEmbedder), Arc::new(InMemoryVectorStore::new(2)));
        assert!(retriever.retrieve("east", 3).await.unwrap().is_empty());
    }
}
