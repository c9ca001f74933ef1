use crate::error::{RagError, Result};
use crate::llm::message::ConversationMessage;
use crate::persona::PersonaProfile;

/// Opening of every augmented message built without retrieved context.
pub const NO_CONTEXT_MARKER: &str = "No relevant context was found";

/// Builds the message list sent for generation from a persona, the conversation
/// so far and the retrieved passages.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    persona: PersonaProfile,
}

impl PromptComposer {
    pub fn new(persona: PersonaProfile) -> Self {
        Self { persona }
    }

    /// Wrap `question` with the retrieved passages and response guidance.
    pub fn augment(&self, question: &str, passages: &[String]) -> String {
        let persona = &self.persona;
        let mut prompt = String::new();

        if passages.is_empty() {
            prompt.push_str(NO_CONTEXT_MARKER);
            prompt.push_str(" for this question. Answer using your general knowledge.\n\n");
            prompt.push_str(&persona.question_heading);
            prompt.push('\n');
            prompt.push_str(question);
            return prompt;
        }

        prompt.push_str(&persona.context_heading);
        prompt.push('\n');
        for (i, passage) in passages.iter().enumerate() {
            prompt.push_str(&format!("{} {}: {}\n\n", persona.passage_label, i + 1, passage));
        }

        prompt.push_str(&persona.question_heading);
        prompt.push('\n');
        prompt.push_str(question);

        if !persona.guidance.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&persona.guidance_heading);
            for line in &persona.guidance {
                prompt.push_str("\n- ");
                prompt.push_str(line);
            }
        }

        prompt
    }

    /// `[system, ...history except the newest, augmented newest]`.
    ///
    /// The newest message must come from the user.
    pub fn compose(
        &self,
        history: &[ConversationMessage],
        passages: &[String],
    ) -> Result<Vec<ConversationMessage>> {
        let question = latest_question(history)?;
        let prior = &history[..history.len() - 1];

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ConversationMessage::system(self.persona.system_prompt.clone()));
        messages.extend(prior.iter().cloned());
        messages.push(ConversationMessage::user(self.augment(question, passages)));
        Ok(messages)
    }
}

/// Content of the newest message, which must come from the user.
pub fn latest_question(history: &[ConversationMessage]) -> Result<&str> {
    match history.last() {
        Some(ConversationMessage::User { content }) => Ok(content),
        Some(other) => Err(RagError::InvalidRequest(format!(
            "last message must come from the user, got {}",
            other.role()
        ))),
        None => Err(RagError::InvalidRequest("conversation is empty".to_string())),
    }
}
