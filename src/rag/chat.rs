use tracing::info;

use crate::error::Result;
use crate::llm::message::{ConversationMessage, GenerationRequest};
use crate::llm::stream::{RelayStream, StreamingRelay};
use crate::rag::prompt::{latest_question, PromptComposer};
use crate::rag::retriever::Retriever;

/// One chat route: a persona, a generation model and the provider serving it.
#[derive(Clone)]
pub struct ChatEngine {
    retriever: Retriever,
    composer: PromptComposer,
    relay: StreamingRelay,
    model: String,
    top_k: usize,
}

impl ChatEngine {
    pub fn new(
        retriever: Retriever,
        composer: PromptComposer,
        relay: StreamingRelay,
        model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            composer,
            relay,
            model: model.into(),
            top_k,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Retrieve context for the newest user message and start streaming the answer.
    ///
    /// Retrieval and composition finish before the generation request goes out, so
    /// their errors are returned here rather than through the stream.
    pub async fn answer(&self, history: &[ConversationMessage]) -> Result<RelayStream> {
        let question = latest_question(history)?;

        let passages = self.retriever.retrieve(question, self.top_k).await?;
        let messages = self.composer.compose(history, &passages)?;

        info!(
            provider = self.relay.provider_name(),
            model = %self.model,
            history = history.len(),
            passages = passages.len(),
            "starting generation"
        );
        Ok(self.relay.start(GenerationRequest::streaming(self.model.clone(), messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::InMemoryVectorStore;
    use crate::error::RagError;
    use crate::llm::embeddings::{Embedder, HashEmbedder};
    use crate::llm::stream::GenerationStreamEvent;
    use crate::persona::PersonaProfile;
    use crate::providers::traits::{DeltaStream, GenerationProvider};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingProvider {
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerationProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream> {
            self.requests.lock().unwrap().push(request);
            Ok(Box::pin(futures::stream::iter(vec![Ok("ok".to_string())])))
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::embedding("broken", "upstream unavailable"))
        }

        fn dimensions(&self) -> usize {
            16
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn engine(provider: Arc<RecordingProvider>) -> ChatEngine {
        engine_with(Arc::new(HashEmbedder::new(16)), provider)
    }

    fn engine_with(embedder: Arc<dyn Embedder>, provider: Arc<RecordingProvider>) -> ChatEngine {
        let retriever = Retriever::new(embedder, Arc::new(InMemoryVectorStore::new(16)));
        ChatEngine::new(
            retriever,
            PromptComposer::new(PersonaProfile::general()),
            StreamingRelay::new(provider, 4),
            "gpt-4",
            3,
        )
    }

    #[tokio::test]
    async fn test_answer_sends_composed_request() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = engine(Arc::clone(&provider));

        let history = vec![
            ConversationMessage::assistant("How can I help?"),
            ConversationMessage::user("What is a chunk?"),
        ];
        let events: Vec<_> = engine.answer(&history).await.unwrap().collect().await;
        assert_eq!(
            events,
            vec![
                GenerationStreamEvent::Delta("ok".to_string()),
                GenerationStreamEvent::Completed
            ]
        );

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4");
        assert!(requests[0].stream);
        assert_eq!(requests[0].messages.len(), 3);
        assert!(requests[0].messages[2].content().contains("What is a chunk?"));
    }

    #[tokio::test]
    async fn test_answer_rejects_history_not_ending_with_user() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = engine(Arc::clone(&provider));

        let err = engine
            .answer(&[ConversationMessage::assistant("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidRequest(_)));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_generation() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = engine_with(Arc::new(BrokenEmbedder), Arc::clone(&provider));

        let err = engine
            .answer(&[ConversationMessage::user("anything indexed?")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
        assert!(provider.requests.lock().unwrap().is_empty());
    }
}
