use super::provider::LLMProvider;
use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "chatmem";

/// Environment variable that takes precedence over the keychain
pub const API_KEY_ENV: &str = "CHATMEM_API_KEY";

/// Secure API key storage using OS keychain
pub struct APIKeyStorage;

impl APIKeyStorage {
    /// Save API key to OS keychain
    pub fn save(provider: &LLMProvider, api_key: &str) -> Result<()> {
        let entry = Self::entry(provider)?;

        entry
            .set_password(api_key)
            .context("Failed to save API key to keychain")?;

        tracing::info!("Saved API key to keychain for provider: {}", provider);

        Ok(())
    }

    /// Load API key from OS keychain
    pub fn load(provider: &LLMProvider) -> Result<Option<String>> {
        let entry = Self::entry(provider)?;

        match entry.get_password() {
            Ok(key) => {
                tracing::debug!("Loaded API key from keychain for provider: {}", provider);
                Ok(Some(key))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("No API key found in keychain for provider: {}", provider);
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to load API key from keychain"),
        }
    }

    /// Delete API key from OS keychain
    pub fn delete(provider: &LLMProvider) -> Result<()> {
        let entry = Self::entry(provider)?;

        match entry.delete_credential() {
            Ok(_) => {
                tracing::info!("Deleted API key from keychain for provider: {}", provider);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete API key from keychain"),
        }
    }

    /// Resolve the key for `provider`: `CHATMEM_API_KEY` first, then the keychain.
    /// Providers without keys resolve to an empty string.
    pub fn resolve(provider: &LLMProvider) -> Result<String> {
        if !provider.needs_api_key() {
            return Ok(String::new());
        }

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        Self::load(provider)?.ok_or_else(|| {
            anyhow::anyhow!(
                "API key not found for provider {} (set {} or store it in the keychain)",
                provider,
                API_KEY_ENV
            )
        })
    }

    fn entry(provider: &LLMProvider) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &provider.to_string()).context("Failed to create keychain entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_key_requirement() {
        assert_eq!(APIKeyStorage::resolve(&LLMProvider::Ollama).unwrap(), "");
    }

    #[test]
    #[ignore] // needs a reachable OS keychain
    fn test_api_key_storage() {
        let provider = LLMProvider::Anthropic;
        let api_key = "test-api-key-secret";

        APIKeyStorage::save(&provider, api_key).unwrap();

        let loaded = APIKeyStorage::load(&provider).unwrap();
        assert_eq!(loaded, Some(api_key.to_string()));

        APIKeyStorage::delete(&provider).unwrap();

        let loaded_after_delete = APIKeyStorage::load(&provider).unwrap();
        assert_eq!(loaded_after_delete, None);

        // Deleting twice is fine
        APIKeyStorage::delete(&provider).unwrap();
    }
}
