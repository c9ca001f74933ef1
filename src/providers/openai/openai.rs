use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::llm::message::{ConversationMessage, GenerationRequest};
use crate::providers::traits::{DeltaStream, GenerationProvider};

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Build an async-openai client, optionally pointed at an OpenAI-compatible base URL.
pub fn openai_client(api_key: &str, api_base: Option<&str>) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }
    Client::with_config(config)
}

/// Streaming chat completions over the OpenAI wire protocol.
///
/// Also serves OpenRouter, which speaks the same protocol at a different base URL.
#[derive(Clone)]
pub struct OpenAIProvider {
    name: String,
    client: Client<OpenAIConfig>,
}

impl OpenAIProvider {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self {
            name: "openai".to_string(),
            client,
        }
    }

    pub fn openrouter(api_key: &str, api_base: &str) -> Self {
        Self {
            name: "openrouter".to_string(),
            client: openai_client(api_key, Some(api_base)),
        }
    }

    fn stream_error(&self, e: impl std::fmt::Display) -> RagError {
        RagError::GenerationStream(format!("{}: {}", self.name, e))
    }

    fn convert_message(&self, message: &ConversationMessage) -> Result<ChatCompletionRequestMessage> {
        let converted = match message {
            ConversationMessage::System { content } => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(|e| self.stream_error(e))?,
            ),
            ConversationMessage::User { content } => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(content.clone()))
                    .build()
                    .map_err(|e| self.stream_error(e))?,
            ),
            ConversationMessage::Assistant { content } => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(|e| self.stream_error(e))?,
            ),
        };
        Ok(converted)
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream> {
        let messages = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect::<Result<Vec<_>>>()?;

        let openai_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .stream(request.stream)
            .build()
            .map_err(|e| self.stream_error(e))?;

        debug!(provider = %self.name, model = %request.model, "opening completion stream");

        let mut upstream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| {
                error!(provider = %self.name, error = %e, "completion request failed");
                self.stream_error(e)
            })?;

        let name = self.name.clone();
        let deltas = stream! {
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        for choice in chunk.choices {
                            if let Some(content) = choice.delta.content {
                                yield Ok(content);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(RagError::GenerationStream(format!("{}: {}", name, e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(deltas))
    }
}
