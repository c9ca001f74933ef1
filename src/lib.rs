pub mod api;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod persona;
pub mod providers;
pub mod rag;

// Re-export commonly used items
pub use config::AppConfig;
pub use document::{Chunk, Chunker, Document};
pub use error::{RagError, Result};
pub use persona::PersonaProfile;
pub use rag::{ChatEngine, PromptComposer, RagPipeline, Retriever};
