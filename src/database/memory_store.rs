use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::vector_db::{IndexEntry, ListedEntry, ScoredEntry, VectorStore};
use crate::error::{RagError, Result};

const BACKEND: &str = "memory";

/// Process-local [`VectorStore`] using cosine similarity.
///
/// Keeps entries in insertion order; an upsert with an existing id replaces the
/// entry in place.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Cosine similarity, 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut stored = self.entries.write().await;
        for entry in entries {
            if entry.vector.len() != self.dimensions {
                return Err(RagError::index_write(
                    BACKEND,
                    format!(
                        "vector has {} dimensions, index expects {}",
                        entry.vector.len(),
                        self.dimensions
                    ),
                ));
            }
            match stored.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>> {
        if vector.len() != self.dimensions {
            return Err(RagError::Retrieval(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        let stored = self.entries.read().await;
        let mut scored: Vec<ScoredEntry> = stored
            .iter()
            .map(|entry| ScoredEntry {
                id: entry.id.clone(),
                score: cosine_similarity(&entry.vector, vector),
                metadata: entry.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list(&self) -> Result<Vec<ListedEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|entry| ListedEntry {
                id: entry.id.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}
