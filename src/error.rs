//! Error types shared by the memory subsystem and the chat turn.

use thiserror::Error;

/// Crate error type.
///
/// Nothing in the memory path surfaces these to the end user; callers map
/// them to a degraded value (empty record, placeholder summary, apology).
#[derive(Error, Debug)]
pub enum Error {
    /// Stored record exists but cannot be interpreted
    #[error("Storage unreadable: {0}")]
    StorageUnreadable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network, auth, rate-limit or provider failure of the completion service
    #[error("Completion service failure: {0}")]
    CompletionService(String),

    /// Completion text did not contain the expected structure
    #[error("Malformed completion output: {0}")]
    MalformedCompletionOutput(String),

    /// Web search error
    #[error("Search error: {0}")]
    Search(String),
}

/// Result type alias for chatmem operations
pub type Result<T> = std::result::Result<T, Error>;
