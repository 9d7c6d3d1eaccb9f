use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use super::store::MemoryStore;
use super::types::{ConversationId, StoredMemory};
use crate::error::{Error, Result};

/// SQLite-backed store; one `conversation_memory` row per conversation
pub struct SqliteMemoryStore {
    db: Pool<Sqlite>,
}

impl SqliteMemoryStore {
    /// Wrap a pool whose schema was created by `database::schema::create_tables`
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    #[cfg(test)]
    async fn conversation_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversation_memory")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn read(&self, id: &ConversationId) -> Result<Option<StoredMemory>> {
        let key = id.storage_key();

        let row = sqlx::query("SELECT payload FROM conversation_memory WHERE key = ?")
            .bind(&key)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.get("payload");
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| Error::StorageUnreadable(format!("{}: {}", key, e)))
    }

    async fn write(&self, id: &ConversationId, record: &StoredMemory) -> Result<()> {
        let payload = serde_json::to_string_pretty(record)?;

        sqlx::query(
            r#"
            INSERT INTO conversation_memory (key, format, payload, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                format = excluded.format,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.storage_key())
        .bind(record.format_name())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &ConversationId) -> Result<()> {
        sqlx::query("DELETE FROM conversation_memory WHERE key = ?")
            .bind(id.storage_key())
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
