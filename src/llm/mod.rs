pub mod embeddings;
pub mod message;
pub mod stream;

pub use embeddings::{Embedder, HashEmbedder, OpenAIEmbedder};
pub use message::{ConversationMessage, GenerationRequest};
pub use stream::{GenerationStreamEvent, RelayOutcome, RelayState, RelayStream, StreamingRelay};
