mod chunker;

pub use chunker::{chunk_text, Chunk, Chunker, SENTENCE_TERMINAL};

use serde_json::{Map, Value};

/// Raw text handed to ingestion together with caller metadata.
/// Not retained once its chunks are indexed.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
