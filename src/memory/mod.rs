//! Conversational memory: a bounded, relevant context window per
//! conversation that survives indefinitely without unbounded growth.
//!
//! ## Module Structure
//!
//! - `types.rs` - Turns, conversation ids, flat/structured record shapes
//! - `store.rs` - `MemoryStore` trait and the JSON file backend
//! - `sqlite_store.rs` - SQLite backend
//! - `context_builder.rs` - Recent window / older partition
//! - `summarization.rs` - Compaction engine (summary + important points)
//! - `token_budget.rs` - Approximate token cap on assembled requests
//! - `manager.rs` - `MemoryManager` orchestrating load/save/clear

pub mod context_builder;
pub mod manager;
pub mod sqlite_store;
pub mod store;
pub mod summarization;
pub mod token_budget;
pub mod types;

pub use context_builder::{ContextBuilder, ContextWindow};
pub use manager::MemoryManager;
pub use sqlite_store::SqliteMemoryStore;
pub use store::{JsonFileStore, MemoryStore};
pub use summarization::{CompactionEngine, SUMMARY_UNAVAILABLE};
pub use types::{
    CompactionResult, ConversationId, ConversationKind, MemoryRecord, StoredMemory,
    StructuredMemory, Turn,
};
