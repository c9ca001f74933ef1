use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Metadata key holding the chunk text verbatim.
pub const TEXT_KEY: &str = "text";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
pub const TOTAL_CHUNKS_KEY: &str = "total_chunks";
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// A vector plus its metadata as written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl IndexEntry {
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(Value::as_str)
    }
}

/// A query hit, ranked by the store's similarity metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl ScoredEntry {
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(Value::as_str)
    }
}

/// An entry returned by [`VectorStore::list`], without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedEntry {
    pub id: String,
    pub metadata: Map<String, Value>,
}

impl ListedEntry {
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(Value::as_str)
    }
}

/// Gateway to a similarity index holding one collection of fixed-dimension vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &str;

    /// Length every stored and queried vector must have.
    fn dimensions(&self) -> usize;

    /// Write entries, replacing any with the same id.
    ///
    /// Not transactional: on failure some entries may already be stored.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `top_k` entries ordered by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>>;

    /// Enumerate every stored entry.
    async fn list(&self) -> Result<Vec<ListedEntry>>;
}
