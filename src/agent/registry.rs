use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::memory::ConversationId;

/// Per-conversation turn locks.
///
/// A chat turn loads, extends and saves the whole record, so two turns of
/// the same conversation must not interleave. Turns of different
/// conversations run concurrently. Created at startup, emptied on shutdown.
#[derive(Default)]
pub struct ConversationRegistry {
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`; released when the guard drops.
    ///
    /// Entries whose lock nobody holds or waits on are pruned here, so the
    /// map only tracks conversations with a turn in flight.
    pub async fn acquire(&self, id: &ConversationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(*id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked conversations
    pub async fn conversation_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Forget every conversation. Turns still holding a guard finish normally.
    pub async fn shutdown(&self) {
        let mut locks = self.locks.lock().await;
        tracing::info!("Conversation registry shut down ({} conversations)", locks.len());
        locks.clear();
    }
}
