use futures::stream::{self, TryStreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::vector_db::{
    IndexEntry, VectorStore, CHUNK_INDEX_KEY, DOCUMENT_ID_KEY, TEXT_KEY, TOTAL_CHUNKS_KEY,
};
use crate::document::{Chunk, Chunker, Document};
use crate::error::{RagError, Result};
use crate::llm::embeddings::Embedder;
use crate::rag::retriever::{RetrievalResult, Retriever};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks: usize,
}

/// An indexed chunk as shown by the document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub text: String,
}

/// Chunk, embed and index documents; look passages back up.
pub struct RagPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    top_k: usize,
    concurrency: usize,
}

impl RagPipeline {
    /// Fails when the embedder and the store disagree on vector length.
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if embedder.dimensions() != store.dimensions() {
            return Err(RagError::Config(format!(
                "embedder {} produces {} dimensions but the {} index expects {}",
                embedder.name(),
                embedder.dimensions(),
                store.backend(),
                store.dimensions()
            )));
        }

        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));
        Ok(Self {
            chunker,
            embedder,
            store,
            retriever,
            top_k: 3,
            concurrency: 1,
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.retriever = self.retriever.with_threshold(threshold);
        self
    }

    /// Maximum number of chunks embedded and written at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Split the document, then embed and upsert every chunk.
    ///
    /// Stops at the first failed chunk and returns its error. Chunks already written
    /// stay in the index.
    pub async fn ingest(&self, document: Document) -> Result<IngestReport> {
        let document_id = Uuid::new_v4().to_string();
        let chunks = self.chunker.chunk(&document.text);
        let total = chunks.len();

        if chunks.is_empty() {
            info!(document.id = %document_id, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport {
                document_id,
                chunks: 0,
            });
        }

        let pending = chunks.into_iter().map(|chunk| {
            let metadata = chunk_metadata(&chunk, &document_id, &document.metadata);
            Ok::<_, RagError>((chunk, metadata))
        });

        stream::iter(pending)
            .try_for_each_concurrent(self.concurrency, |(chunk, metadata)| {
                let document_id = document_id.as_str();
                async move {
                    let vector = self.embedder.embed(&chunk.text).await.map_err(|e| {
                        error!(document.id = %document_id, chunk_index = chunk.chunk_index, error = %e, "embedding failed during ingestion");
                        e
                    })?;

                    let entry = IndexEntry {
                        id: Uuid::new_v4().to_string(),
                        vector,
                        metadata,
                    };
                    self.store.upsert(std::slice::from_ref(&entry)).await.map_err(|e| {
                        error!(document.id = %document_id, chunk_index = chunk.chunk_index, error = %e, "upsert failed during ingestion");
                        e
                    })
                }
            })
            .await?;

        info!(document.id = %document_id, chunk_count = total, backend = self.store.backend(), "ingested document");
        Ok(IngestReport {
            document_id,
            chunks: total,
        })
    }

    /// Passages for `query` using the configured `top_k`.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(query, self.top_k).await
    }

    /// Every indexed chunk with its text.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let entries = self.store.list().await?;
        Ok(entries
            .into_iter()
            .map(|entry| DocumentSummary {
                text: entry.text().unwrap_or_default().to_string(),
                id: entry.id,
            })
            .collect())
    }
}

/// Caller metadata plus the reserved chunk fields, which always win.
fn chunk_metadata(chunk: &Chunk, document_id: &str, extra: &Map<String, Value>) -> Map<String, Value> {
    let mut metadata = extra.clone();
    metadata.insert(TEXT_KEY.to_string(), Value::String(chunk.text.clone()));
    metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(chunk.chunk_index));
    metadata.insert(TOTAL_CHUNKS_KEY.to_string(), Value::from(chunk.total_chunks));
    metadata.insert(DOCUMENT_ID_KEY.to_string(), Value::String(document_id.to_string()));
    metadata
}
