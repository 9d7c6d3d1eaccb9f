use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};

/// Create all necessary tables for the sqlite storage backend
pub async fn create_tables(pool: &Pool<Sqlite>) -> Result<()> {
    // One row per conversation; payload is the same JSON document the file
    // backend writes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversation_memory (
            key TEXT PRIMARY KEY,
            format TEXT NOT NULL CHECK(format IN ('flat', 'structured')),
            payload TEXT NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create conversation_memory table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_conversation_memory_updated_at
        ON conversation_memory(updated_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create conversation_memory index")?;

    tracing::debug!("Database tables created successfully");

    Ok(())
}
