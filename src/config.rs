//! Application configuration, read from `<app dir>/config.json`.
//!
//! Every field has a default, so a missing file or a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::llm::LLMProvider;
use crate::utils::paths::get_config_path;

/// Memory subsystem tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exchanges kept verbatim
    pub recent_turns: usize,
    /// Saves with more user turns than this are compacted
    pub summary_threshold: usize,
    /// Approximate token budget for assembled chat requests
    pub max_context_tokens: usize,
    /// Hard cap on stored turns outside compaction
    pub flat_history_cap: usize,
    /// Trailing entries serialized for the summary prompt
    pub summary_window: usize,
    /// Trailing entries scanned for important points
    pub points_window: usize,
    /// Newest important points kept across re-compactions
    pub max_important_points: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_turns: 4,
            summary_threshold: 20,
            max_context_tokens: 800,
            flat_history_cap: 60,
            summary_window: 30,
            points_window: 20,
            max_important_points: 20,
        }
    }
}

/// Where conversation records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per conversation
    #[default]
    Json,
    /// Single SQLite database
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: LLMProvider,
    /// Model identifier; falls back to the provider default
    pub model: Option<String>,
    /// Custom endpoint (OpenAI-compatible service, remote Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Character prompt sent first in every chat request
    pub persona_prompt: String,
    /// Offset used for wall-clock and relative timestamps
    pub utc_offset_hours: i32,
    pub storage: StorageBackend,
    pub search_enabled: bool,
    pub memory: MemoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            model: None,
            api_base_url: None,
            persona_prompt: DEFAULT_PERSONA.to_string(),
            utc_offset_hours: 8,
            storage: StorageBackend::default(),
            search_enabled: true,
            memory: MemoryConfig::default(),
        }
    }
}

const DEFAULT_PERSONA: &str = "You are a friendly, attentive chat companion. \
    Keep replies short and natural, remember what the user has told you, \
    and follow up on anything you promised.";

impl AppConfig {
    /// Load from the default location, defaults when the file is missing
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config")?;
        let config: AppConfig =
            serde_json::from_str(&contents).context("Failed to parse config")?;

        config.validate()?;

        tracing::debug!("Loaded config from {}", path.display());

        Ok(config)
    }

    /// Model to request, resolving the provider default
    pub fn model(&self) -> Result<String> {
        self.model
            .clone()
            .or_else(|| self.provider.default_model().map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!("No model configured for provider {}", self.provider)
            })
    }

    fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if memory.recent_turns == 0 {
            anyhow::bail!("memory.recent_turns must be at least 1");
        }
        if memory.summary_threshold < memory.recent_turns {
            anyhow::bail!(
                "memory.summary_threshold ({}) must not be below memory.recent_turns ({})",
                memory.summary_threshold,
                memory.recent_turns
            );
        }
        if memory.max_important_points == 0 {
            anyhow::bail!("memory.max_important_points must be at least 1");
        }
        if memory.flat_history_cap < memory.recent_turns * 2 {
            anyhow::bail!("memory.flat_history_cap must hold at least the recent window");
        }
        Ok(())
    }
}
