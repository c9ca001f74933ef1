use thiserror::Error;

/// Failures raised anywhere in the ingestion or query pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    /// The embedding provider rejected or failed the request.
    #[error("Embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// Writing to the vector index failed. Earlier entries of the same
    /// ingestion may already be stored.
    #[error("Index write error ({backend}): {message}")]
    IndexWrite { backend: String, message: String },

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The generation stream aborted before completing.
    #[error("Generation stream error: {0}")]
    GenerationStream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RagError {
    pub fn embedding(provider: impl Into<String>, message: impl ToString) -> Self {
        RagError::Embedding {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn index_write(backend: impl Into<String>, message: impl ToString) -> Self {
        RagError::IndexWrite {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
