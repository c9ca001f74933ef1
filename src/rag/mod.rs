pub mod chat;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use chat::ChatEngine;
pub use pipeline::{DocumentSummary, IngestReport, RagPipeline};
pub use prompt::{latest_question, PromptComposer, NO_CONTEXT_MARKER};
pub use retriever::{RetrievalResult, Retriever};
