pub mod memory_store;
pub mod qdrant_config;
pub mod qdrant_store;
pub mod vector_db;

pub use memory_store::InMemoryVectorStore;
pub use qdrant_store::{QdrantSettings, QdrantStore};
pub use vector_db::{IndexEntry, ListedEntry, ScoredEntry, VectorStore};
