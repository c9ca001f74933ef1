use serde::{Deserialize, Serialize};

/// One turn of a conversation, tagged by role on the wire:
/// `{"role": "user", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            }
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// A fully composed request for the generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn streaming(model: impl Into<String>, messages: Vec<ConversationMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tagged_messages() {
        let raw = r#"[
            {"role": "assistant", "content": "Hi!"},
            {"role": "user", "content": "What is Article 1?"}
        ]"#;
        let messages: Vec<ConversationMessage> = serde_json::from_str(raw).unwrap();
        assert_eq!(messages[0], ConversationMessage::assistant("Hi!"));
        assert!(messages[1].is_user());
        assert_eq!(messages[1].content(), "What is Article 1?");
    }

    #[test]
    fn test_rejects_unknown_role_and_missing_content() {
        assert!(serde_json::from_str::<ConversationMessage>(
            r#"{"role": "tool", "content": "x"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ConversationMessage>(r#"{"role": "user"}"#).is_err());
    }

    #[test]
    fn test_serializes_role_field() {
        let value = serde_json::to_value(ConversationMessage::system("be brief")).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "be brief");
    }
}
