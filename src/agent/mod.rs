//! One complete chat turn on top of the memory subsystem.
//!
//! load -> search-intent analysis (+ optional web search) -> prompt assembly
//! -> completion -> append + save. A failed completion becomes an apology
//! reply and is still recorded, so stored state stays consistent.

pub mod registry;
pub mod search;

use chrono::FixedOffset;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};
use crate::memory::types::{render_points, POINTS_LABEL, SUMMARY_LABEL};
use crate::memory::{ContextWindow, ConversationId, MemoryManager, Turn};
use crate::utils::time::{current_time_str, relative_time, unix_now};

pub use registry::ConversationRegistry;
pub use search::{analyze_search_intent, DuckDuckGoSearch, SearchIntent, SearchProvider};

/// Reply recorded when the completion service fails
pub const APOLOGY_REPLY: &str =
    "Sorry, my head is spinning a little right now... could we try another topic?";

const CHAT_TEMPERATURE: f64 = 0.8;
const CHAT_MAX_TOKENS: u64 = 600;

/// What the search step produced for this turn
#[derive(Debug, Clone, PartialEq)]
enum SearchOutcome {
    NotNeeded,
    Results(String),
    Unavailable,
}

/// Chat front end owning the memory manager and the completion client
pub struct ChatAgent {
    memory: MemoryManager,
    client: Arc<dyn CompletionService>,
    search: Option<Arc<dyn SearchProvider>>,
    registry: ConversationRegistry,
    model: String,
    persona_prompt: String,
    offset: FixedOffset,
}

impl ChatAgent {
    pub fn new(
        memory: MemoryManager,
        client: Arc<dyn CompletionService>,
        model: impl Into<String>,
        persona_prompt: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            memory,
            client,
            search: None,
            registry: ConversationRegistry::new(),
            model: model.into(),
            persona_prompt: persona_prompt.into(),
            offset,
        }
    }

    /// Enable web search for turns the LLM judges to need it
    pub fn with_search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    /// Handle one inbound message for `id` and return the reply
    pub async fn chat(&self, id: &ConversationId, user_message: &str) -> String {
        let _turn = self.registry.acquire(id).await;

        let mut memory = self.memory.load_memory(id).await;

        let search = self.run_search(user_message, &memory).await;
        let now = unix_now();

        let window = self.memory.build_context(&memory).await;
        let messages = self.assemble_messages(&window, user_message, &search);

        let request = CompletionRequest::new(&self.model, messages)
            .temperature(CHAT_TEMPERATURE)
            .max_tokens(CHAT_MAX_TOKENS);

        let reply = match self.client.complete(request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!("Chat completion failed for {}: {}", id, e);
                APOLOGY_REPLY.to_string()
            }
        };

        memory.push(Turn::user(user_message, now));
        memory.push(Turn::assistant(reply.clone(), now));
        if let Err(e) = self.memory.save_memory(id, memory).await {
            tracing::error!("Failed to persist turn for {}: {}", id, e);
        }

        tracing::info!(
            "Handled turn for {} (reply length: {})",
            id,
            reply.chars().count()
        );

        reply
    }

    /// Forget everything remembered for `id`
    pub async fn clear(&self, id: &ConversationId) -> Result<()> {
        let _turn = self.registry.acquire(id).await;
        self.memory.clear_memory(id).await
    }

    async fn run_search(&self, user_message: &str, memory: &[Turn]) -> SearchOutcome {
        let Some(provider) = &self.search else {
            return SearchOutcome::NotNeeded;
        };

        let intent = analyze_search_intent(
            self.client.as_ref(),
            &self.model,
            user_message,
            memory,
            self.offset,
        )
        .await;

        if !intent.need_search {
            return SearchOutcome::NotNeeded;
        }

        tracing::info!("Searching the web for: {}", intent.search_query);
        match provider.search(&intent.search_query).await {
            Ok(results) => SearchOutcome::Results(results),
            Err(e) => {
                tracing::warn!("Web search failed: {}", e);
                SearchOutcome::Unavailable
            }
        }
    }

    /// Persona, time, summary, points and recent turns go through the token
    /// budget; search context and the new message are appended after it.
    fn assemble_messages(
        &self,
        window: &ContextWindow,
        user_message: &str,
        search: &SearchOutcome,
    ) -> Vec<ChatMessage> {
        let current_time = current_time_str(self.offset);

        let mut messages = vec![
            ChatMessage::system(&self.persona_prompt),
            ChatMessage::system(format!("Current time: {}", current_time)),
        ];

        if !window.summary.is_empty() {
            messages.push(ChatMessage::system(format!(
                "{} {}",
                SUMMARY_LABEL, window.summary
            )));
        }

        if !window.important_points.is_empty() {
            messages.push(ChatMessage::system(format!(
                "{}\n{}",
                POINTS_LABEL,
                render_points(&window.important_points)
            )));
        }

        for turn in &window.recent {
            let content = if turn.timestamp != 0.0 {
                format!(
                    "[{}] {}",
                    relative_time(turn.timestamp, self.offset),
                    turn.content
                )
            } else {
                turn.content.clone()
            };
            messages.push(ChatMessage::new(turn.role, content));
        }

        let mut messages = self.memory.fit_to_budget(messages);

        match search {
            SearchOutcome::Results(results) => messages.push(ChatMessage::system(format!(
                "[Web search results]\n{}\n[End of search results]\n\n\
                 Answer using the results above. If they do not cover the question, \
                 say so honestly and answer from what you already know.",
                results
            ))),
            SearchOutcome::Unavailable => messages.push(ChatMessage::system(
                "You decided a web search was needed, but search is unavailable right now. \
                 Answer from what you already know and mention that a search could give \
                 more accurate information.",
            )),
            SearchOutcome::NotNeeded => {}
        }

        messages.push(ChatMessage::user(format!(
            "[{}] {}",
            current_time, user_message
        )));

        messages
    }
}
