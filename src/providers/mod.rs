pub mod openai;
pub mod traits;

pub use openai::openai::{openai_client, OpenAIProvider, OPENROUTER_API_BASE};
pub use traits::{DeltaStream, GenerationProvider};
