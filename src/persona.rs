use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RagError, Result};

/// Persona text and prompt-augmentation wording for one chat profile.
///
/// Loaded from JSON; every field except `name` and `system_prompt` falls back to
/// the general assistant wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    pub system_prompt: String,
    #[serde(default = "default_context_heading")]
    pub context_heading: String,
    #[serde(default = "default_passage_label")]
    pub passage_label: String,
    #[serde(default = "default_question_heading")]
    pub question_heading: String,
    #[serde(default = "default_guidance_heading")]
    pub guidance_heading: String,
    #[serde(default = "default_guidance")]
    pub guidance: Vec<String>,
}

fn default_context_heading() -> String {
    "**Context Information:**".to_string()
}

fn default_passage_label() -> String {
    "Context".to_string()
}

fn default_question_heading() -> String {
    "**User's Question:**".to_string()
}

fn default_guidance_heading() -> String {
    "**Guidance for Response:**".to_string()
}

fn default_guidance() -> Vec<String> {
    vec![
        "Please provide a concise and structured answer.".to_string(),
        "Use bullet points or numbered lists if necessary to clarify distinct points.".to_string(),
        "When you rely on the context above, say so (e.g. \"Based on the information provided...\").".to_string(),
        "Avoid technical jargon unless explicitly relevant.".to_string(),
    ]
}

impl PersonaProfile {
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| RagError::Config(format!("invalid persona profile: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("cannot read persona file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// General-purpose assistant used by the default chat route.
    pub fn general() -> Self {
        Self {
            name: "Assistant".to_string(),
            system_prompt: "You are an AI assistant designed to provide helpful and accurate information. When responding:\n\
                \n\
                1. Always strive for accuracy and relevance.\n\
                2. Use Markdown formatting for readability: **bold** for emphasis, *italics* for subtle emphasis, `code` for technical terms, lists for multiple items, > for quotations and --- to separate sections.\n\
                3. Structure the answer in focused paragraphs separated by blank lines, with a blank line before and after every list.\n\
                4. If you use the provided context, indicate it subtly (e.g. \"Based on the information provided...\").\n\
                5. If the provided context is not relevant, rely on your general knowledge and do not mention the context.\n\
                6. Avoid personal details or names unless directly relevant to the question.\n\
                7. Keep a consistent persona throughout the conversation.\n\
                8. If you are unsure or lack information on a topic, say so clearly."
                .to_string(),
            context_heading: default_context_heading(),
            passage_label: default_passage_label(),
            question_heading: default_question_heading(),
            guidance_heading: default_guidance_heading(),
            guidance: default_guidance(),
        }
    }

    /// Constitutional-law specialist used by the Llama chat route.
    pub fn constitution() -> Self {
        Self {
            name: "Constitution Assistant".to_string(),
            system_prompt: "You are an AI assistant specialising in the Constitution of Nepal. Your job is to give accurate, detailed and helpful information about Nepal's constitutional framework. When responding:\n\
                \n\
                1. Prioritise accuracy and relevance to the Constitution.\n\
                2. Use Markdown formatting and clear paragraphs.\n\
                3. Refer to the constitutional provisions supplied with the question.\n\
                4. If the provisions do not cover the question, say that the matter may not be addressed by the current constitutional framework.\n\
                5. Use the official terms and names used in the Constitution.\n\
                6. Keep a formal and authoritative tone.\n\
                7. Politely steer questions outside the Constitution back to constitutional matters.\n\
                8. Mention historical context or amendments when relevant."
                .to_string(),
            context_heading: "Relevant Constitutional Provisions:".to_string(),
            passage_label: "Constitutional Provision".to_string(),
            question_heading: "User's Question about Nepal's Constitution:".to_string(),
            guidance_heading: "Guidance for Response:".to_string(),
            guidance: vec![
                "Provide a concise and structured answer based on Nepal's Constitution.".to_string(),
                "Use bullet points or numbered lists to separate distinct constitutional points.".to_string(),
                "Use official legal and constitutional terminology.".to_string(),
                "If the question concerns a specific article or section, cite it directly.".to_string(),
                "If the provisions above are insufficient, say so and add relevant general knowledge of Nepal's constitutional framework.".to_string(),
            ],
        }
    }
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self::general()
    }
}

impl std::fmt::Display for PersonaProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_profile_uses_default_wording() {
        let profile = PersonaProfile::from_json(
            r#"{"name": "Librarian", "system_prompt": "You answer questions about the archive."}"#,
        )
        .unwrap();
        assert_eq!(profile.name, "Librarian");
        assert_eq!(profile.passage_label, "Context");
        assert_eq!(profile.guidance, PersonaProfile::general().guidance);
    }

    #[test]
    fn test_invalid_profile_is_config_error() {
        assert!(matches!(
            PersonaProfile::from_json(r#"{"name": "x"}"#),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            PersonaProfile::from_file("/nonexistent/persona.json"),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_builtin_profiles_differ() {
        let general = PersonaProfile::general();
        let constitution = PersonaProfile::constitution();
        assert_ne!(general.passage_label, constitution.passage_label);
        assert!(constitution.system_prompt.contains("Constitution"));
        assert_eq!(general.to_string(), "Assistant");
    }
}
