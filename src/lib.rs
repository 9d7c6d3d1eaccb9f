// Modules
pub mod agent;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod memory;
pub mod utils;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::agent::{ChatAgent, DuckDuckGoSearch};
use crate::config::{AppConfig, StorageBackend};
use crate::llm::{APIKeyStorage, CompletionService, RigCompletionService};
use crate::memory::{JsonFileStore, MemoryManager, MemoryStore, SqliteMemoryStore};
use crate::utils::{paths, time::offset_from_hours};

/// Wire a [`ChatAgent`] from configuration: completion client, storage
/// backend, memory manager and optional web search.
pub async fn build_agent(config: &AppConfig) -> Result<ChatAgent> {
    let model = config.model()?;
    let api_key = APIKeyStorage::resolve(&config.provider)?;

    let client: Arc<dyn CompletionService> = Arc::new(RigCompletionService::new(
        config.provider,
        &api_key,
        config.api_base_url.as_deref(),
    )?);

    let store: Arc<dyn MemoryStore> = match config.storage {
        StorageBackend::Json => Arc::new(
            JsonFileStore::new(paths::get_memory_dir()?)
                .context("Failed to open memory directory")?,
        ),
        StorageBackend::Sqlite => {
            let db = database::init_database(&paths::get_database_path()?).await?;
            Arc::new(SqliteMemoryStore::new(db))
        }
    };

    let memory = MemoryManager::new(store, client.clone(), &model, config.memory.clone());

    let mut agent = ChatAgent::new(
        memory,
        client,
        &model,
        &config.persona_prompt,
        offset_from_hours(config.utc_offset_hours),
    );

    if config.search_enabled {
        agent = agent.with_search(Arc::new(DuckDuckGoSearch::default()));
    }

    tracing::info!(
        "Chat agent ready (provider: {}, model: {}, storage: {:?})",
        config.provider,
        model,
        config.storage
    );

    Ok(agent)
}
