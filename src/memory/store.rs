//! Durable per-conversation memory records.
//!
//! Backends implement the fallible `read` / `write` / `remove` trio; the
//! provided `load` / `save` / `clear` methods are the fail-soft contract the
//! memory manager relies on.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{ConversationId, MemoryRecord, StoredMemory};
use crate::error::{Error, Result};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Read the stored record, `Ok(None)` when nothing was ever saved
    async fn read(&self, id: &ConversationId) -> Result<Option<StoredMemory>>;

    /// Replace the stored record with `record`
    async fn write(&self, id: &ConversationId, record: &StoredMemory) -> Result<()>;

    /// Delete the record and any auxiliary artifacts; missing records are fine
    async fn remove(&self, id: &ConversationId) -> Result<()>;

    /// Load and normalize. Missing or unreadable records yield an empty record.
    async fn load(&self, id: &ConversationId) -> MemoryRecord {
        match self.read(id).await {
            Ok(Some(stored)) => MemoryRecord::from(stored),
            Ok(None) => MemoryRecord::empty(),
            Err(e) => {
                tracing::warn!("Memory for {} unreadable, starting empty: {}", id, e);
                MemoryRecord::empty()
            }
        }
    }

    /// Persist `record`, overwriting prior content.
    async fn save(&self, id: &ConversationId, record: &StoredMemory) -> Result<()> {
        self.write(id, record).await?;
        tracing::debug!("Saved {} memory for {}", record.format_name(), id);
        Ok(())
    }

    /// Delete everything stored for `id`. Idempotent.
    async fn clear(&self, id: &ConversationId) -> Result<()> {
        self.remove(id).await?;
        tracing::info!("Cleared memory for {}", id);
        Ok(())
    }
}

/// One human-readable JSON file per conversation
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store files under `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `<dir>/user_42.json`
    pub fn record_path(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("{}.json", id.storage_key()))
    }

    /// Auxiliary `<dir>/user_42.summary` artifact removed on clear
    pub fn summary_path(&self, id: &ConversationId) -> PathBuf {
        self.record_path(id).with_extension("summary")
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    async fn read(&self, id: &ConversationId) -> Result<Option<StoredMemory>> {
        let path = self.record_path(id);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::StorageUnreadable(format!("{}: {}", path.display(), e)))
    }

    async fn write(&self, id: &ConversationId, record: &StoredMemory) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.record_path(id), contents).await?;
        Ok(())
    }

    async fn remove(&self, id: &ConversationId) -> Result<()> {
        remove_if_exists(&self.record_path(id)).await?;
        remove_if_exists(&self.summary_path(id)).await?;
        Ok(())
    }
}
