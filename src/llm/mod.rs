//! Text-completion service contract.
//!
//! The memory subsystem treats the LLM as an opaque, unreliable service:
//! one request in, one text completion (or an error) out. Conversation
//! identity lives entirely in the request payload.

pub mod keychain;
pub mod provider;
pub mod rig_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use keychain::APIKeyStorage;
pub use provider::LLMProvider;
pub use rig_client::RigCompletionService;

/// Author of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One role/content pair of a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Single user prompt, the shape used by every instructional template
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model, vec![ChatMessage::user(prompt)])
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Process-wide completion client, shared by every conversation
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one completion. Any transport, auth or provider failure is an
    /// [`Error::CompletionService`](crate::error::Error::CompletionService).
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted completion service for unit tests.

    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies in order; `Err` entries simulate outages.
    /// When the queue is empty every call fails.
    #[derive(Default)]
    pub struct ScriptedCompletion {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, reason: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(reason.to_string()));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(reason)) => Err(Error::CompletionService(reason)),
                None => Err(Error::CompletionService("no scripted reply".to_string())),
            }
        }
    }
}
