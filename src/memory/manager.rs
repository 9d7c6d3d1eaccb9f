//! Memory manager: the public entry point of the memory subsystem.
//!
//! A conversation's stored record moves through
//! `empty -> flat -> flat (capped) -> structured -> structured (growing) -> re-compacted`.
//! Compaction triggers whenever a save sees more than `summary_threshold`
//! user turns.

use std::sync::Arc;

use super::context_builder::{ContextBuilder, ContextWindow};
use super::store::MemoryStore;
use super::summarization::{merge_points, CompactionEngine};
use super::token_budget;
use super::types::{ConversationId, MemoryRecord, StoredMemory, StructuredMemory, Turn};
use crate::config::MemoryConfig;
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionService, Role};

pub struct MemoryManager {
    store: Arc<dyn MemoryStore>,
    engine: Arc<CompactionEngine>,
    context_builder: ContextBuilder,
    config: MemoryConfig,
}

impl MemoryManager {
    /// Create a manager over `store`, compacting with `client` / `model`
    pub fn new(
        store: Arc<dyn MemoryStore>,
        client: Arc<dyn CompletionService>,
        model: impl Into<String>,
        config: MemoryConfig,
    ) -> Self {
        let engine = Arc::new(CompactionEngine::new(
            client,
            model,
            config.summary_window,
            config.points_window,
        ));
        let context_builder = ContextBuilder::new(engine.clone(), config.recent_turns);

        Self {
            store,
            engine,
            context_builder,
            config,
        }
    }

    pub fn compaction_engine(&self) -> &CompactionEngine {
        &self.engine
    }

    /// Normalized turns for `id`; empty when nothing (readable) is stored
    pub async fn load_memory(&self, id: &ConversationId) -> Vec<Turn> {
        self.store.load(id).await.into_turns()
    }

    /// Persist `turns` for `id`, compacting when the user-turn count exceeds
    /// the threshold. A failed structured write falls back to a flat write.
    pub async fn save_memory(&self, id: &ConversationId, turns: Vec<Turn>) -> Result<()> {
        let previous = self.store.load(id).await;
        let carried = continued_structure(&previous, &turns);
        let total_turns = count_user_turns(&turns);

        if total_turns > self.config.summary_threshold {
            tracing::info!(
                "{} has {} user turns (> {}), compacting",
                id,
                total_turns,
                self.config.summary_threshold
            );

            let (older, recent) = split_at_user_turn(
                &turns,
                total_turns.saturating_sub(self.config.recent_turns),
            );

            if !older.is_empty() {
                let compaction = self.engine.compact(&older).await;
                let previous_points = carried
                    .map(|prev| prev.important_points.as_slice())
                    .unwrap_or_default();
                let important_points = merge_points(
                    previous_points,
                    compaction.important_points,
                    self.config.max_important_points,
                );

                let structured = StoredMemory::Structured(StructuredMemory {
                    summary: compaction.summary,
                    important_points,
                    recent_messages: recent,
                    last_summary_turn: total_turns,
                });

                match self.store.save(id, &structured).await {
                    Ok(()) => {
                        tracing::info!(
                            "Saved compacted memory for {}, keeping the last {} turns verbatim",
                            id,
                            self.config.recent_turns
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::error!("Failed to save compacted memory for {}: {}", id, e);
                    }
                }
            }
        } else if let Some(prev) = carried {
            let synthesized = previous.synthesized_len();
            let structured = StoredMemory::Structured(StructuredMemory {
                summary: prev.summary.clone(),
                important_points: prev.important_points.clone(),
                recent_messages: self.cap(turns[synthesized..].to_vec()),
                last_summary_turn: prev.last_summary_turn,
            });

            match self.store.save(id, &structured).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::error!("Failed to save structured memory for {}: {}", id, e);
                }
            }
        }

        let flat = StoredMemory::Flat(self.cap(turns));
        self.store.save(id, &flat).await.inspect_err(|e| {
            tracing::error!("Failed to save memory for {}: {}", id, e);
        })
    }

    /// Delete all memory for `id`. Clearing twice is not an error.
    pub async fn clear_memory(&self, id: &ConversationId) -> Result<()> {
        self.store.clear(id).await
    }

    /// Recent window plus compacted older context for `turns`
    pub async fn build_context(&self, turns: &[Turn]) -> ContextWindow {
        self.context_builder.build(turns).await
    }

    /// Trim assembled request messages to the configured token budget
    pub fn fit_to_budget(&self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        token_budget::truncate(messages, self.config.max_context_tokens)
    }

    /// Keep only the newest `flat_history_cap` turns
    fn cap(&self, mut turns: Vec<Turn>) -> Vec<Turn> {
        let cap = self.config.flat_history_cap;
        if turns.len() > cap {
            let dropped = turns.len() - cap;
            turns.drain(..dropped);
            tracing::debug!("Dropped {} oldest turns over the {} cap", dropped, cap);
        }
        turns
    }
}

fn count_user_turns(turns: &[Turn]) -> usize {
    turns.iter().filter(|t| t.role == Role::User).count()
}

/// Split before the `(older_turns + 1)`-th user turn: the first part holds
/// user turns `1..=older_turns` with their replies (and any leading system
/// turns), the second part everything after.
fn split_at_user_turn(turns: &[Turn], older_turns: usize) -> (Vec<Turn>, Vec<Turn>) {
    let mut older = Vec::new();
    let mut recent = Vec::new();
    let mut current_turn = 0usize;

    for turn in turns {
        if turn.role == Role::User {
            current_turn += 1;
        }

        if current_turn <= older_turns {
            older.push(turn.clone());
        } else {
            recent.push(turn.clone());
        }
    }

    (older, recent)
}

/// The stored structured record when `turns` still begins with its
/// synthesized summary turns, i.e. `turns` was derived from that record.
fn continued_structure<'a>(
    previous: &'a MemoryRecord,
    turns: &[Turn],
) -> Option<&'a StructuredMemory> {
    let structured = previous.structured()?;
    let prefix = &previous.turns()[..previous.synthesized_len()];
    turns.starts_with(prefix).then_some(structured)
}
