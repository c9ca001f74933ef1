use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::GenerationRequest;

/// Incremental text deltas from a generation call, ending at completion or error.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat-completion service able to stream its answer.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Submit the request and return the stream of text deltas.
    ///
    /// Dropping the returned stream releases the upstream connection.
    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream>;
}
