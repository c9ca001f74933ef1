use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{RagError, Result};
use crate::providers::OPENROUTER_API_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    OpenAI,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

#[derive(Debug, Clone)]
pub struct OpenAISettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
}

/// The second chat route. Present only when an OpenRouter key is configured.
#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAISettings,
    pub openrouter: Option<OpenRouterSettings>,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_dimensions: usize,
    pub vector_backend: VectorBackend,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub index_name: String,
    pub chunk_max_length: usize,
    pub top_k: usize,
    pub similarity_threshold: Option<f32>,
    pub ingest_concurrency: usize,
    pub list_page_size: u32,
    /// Bounds in-flight HTTP requests and, separately, chat bodies still streaming.
    pub max_concurrent_requests: usize,
    pub relay_buffer: usize,
    pub persona_file: Option<PathBuf>,
    pub llama_persona_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let embedding_backend = match var("EMBEDDING_PROVIDER").as_deref() {
            None | Some("openai") => EmbeddingBackend::OpenAI,
            Some("hash") => EmbeddingBackend::Hash,
            Some(other) => {
                return Err(RagError::Config(format!(
                    "EMBEDDING_PROVIDER must be 'openai' or 'hash', got '{}'",
                    other
                )))
            }
        };

        let vector_backend = match var("VECTOR_STORE").as_deref() {
            None | Some("qdrant") => VectorBackend::Qdrant,
            Some("memory") => VectorBackend::Memory,
            Some(other) => {
                return Err(RagError::Config(format!(
                    "VECTOR_STORE must be 'qdrant' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let openrouter = var("OPENROUTER_API_KEY").map(|api_key| OpenRouterSettings {
            api_key,
            api_url: var("OPENROUTER_API_URL").unwrap_or_else(|| OPENROUTER_API_BASE.to_string()),
            model: var("OPENROUTER_MODEL")
                .unwrap_or_else(|| "meta-llama/llama-3.1-8b-instruct:free".to_string()),
        });

        let config = Self {
            openai: OpenAISettings {
                api_key: var("OPENAI_API_KEY"),
                api_url: var("OPENAI_API_URL"),
                chat_model: var("OPENAI_CHAT_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
                embedding_model: var("OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            },
            openrouter,
            embedding_backend,
            embedding_dimensions: parse_or(&var, "EMBEDDING_DIMENSIONS", 1536)?,
            vector_backend,
            qdrant_url: var("QDRANT_URL").unwrap_or_else(|| "http://localhost:6334".to_string()),
            qdrant_api_key: var("QDRANT_API_KEY"),
            index_name: var("INDEX_NAME").unwrap_or_else(|| "documents".to_string()),
            chunk_max_length: parse_or(&var, "CHUNK_MAX_LENGTH", 2000)?,
            top_k: parse_or(&var, "RETRIEVAL_TOP_K", 3)?,
            similarity_threshold: var("SIMILARITY_THRESHOLD")
                .map(|raw| parse_value("SIMILARITY_THRESHOLD", &raw))
                .transpose()?,
            ingest_concurrency: parse_or(&var, "INGEST_CONCURRENCY", 1)?,
            list_page_size: parse_or(&var, "LIST_PAGE_SIZE", 256)?,
            max_concurrent_requests: parse_or(&var, "MAX_CONCURRENT_REQUESTS", 64)?,
            relay_buffer: parse_or(&var, "RELAY_BUFFER", 32)?,
            persona_file: var("PERSONA_FILE").map(PathBuf::from),
            llama_persona_file: var("LLAMA_PERSONA_FILE").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("EMBEDDING_DIMENSIONS", self.embedding_dimensions),
            ("CHUNK_MAX_LENGTH", self.chunk_max_length),
            ("RETRIEVAL_TOP_K", self.top_k),
            ("INGEST_CONCURRENCY", self.ingest_concurrency),
            ("LIST_PAGE_SIZE", self.list_page_size as usize),
            ("MAX_CONCURRENT_REQUESTS", self.max_concurrent_requests),
            ("RELAY_BUFFER", self.relay_buffer),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(RagError::Config(format!("{} must be greater than zero", key)));
            }
        }

        if self.openai.api_key.is_none() && self.embedding_backend == EmbeddingBackend::OpenAI {
            return Err(RagError::Config(
                "OPENAI_API_KEY must be set when EMBEDDING_PROVIDER is 'openai'".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| RagError::Config(format!("invalid {} '{}': {}", key, raw, e)))
}
