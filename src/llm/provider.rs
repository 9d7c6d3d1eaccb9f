use serde::{Deserialize, Serialize};

/// LLM Provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Anthropic,
    /// OpenAI or any OpenAI-compatible endpoint (set `api_base_url`)
    #[default]
    OpenAI,
    Ollama,
}

impl LLMProvider {
    /// Returns whether this provider requires an API key
    pub fn needs_api_key(&self) -> bool {
        match self {
            LLMProvider::Anthropic => true,
            LLMProvider::OpenAI => true,
            LLMProvider::Ollama => false,
        }
    }

    /// Returns the default model for this provider (if any)
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            LLMProvider::Anthropic => Some("claude-sonnet-4-5-20250929"),
            LLMProvider::OpenAI => Some("gpt-5-mini-2025-08-07"),
            LLMProvider::Ollama => None, // No default
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serde_names() {
        let p: LLMProvider = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(p, LLMProvider::Ollama);
        assert_eq!(
            serde_json::to_string(&LLMProvider::OpenAI).unwrap(),
            "\"openai\""
        );
        assert_eq!(LLMProvider::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_needs_api_key() {
        assert!(LLMProvider::Anthropic.needs_api_key());
        assert!(LLMProvider::OpenAI.needs_api_key());
        assert!(!LLMProvider::Ollama.needs_api_key());
        assert!(LLMProvider::Ollama.default_model().is_none());
    }
}
