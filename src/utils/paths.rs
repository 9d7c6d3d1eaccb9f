use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the main application directory (`$CHATMEM_HOME` or ~/.chatmem)
pub fn get_app_dir() -> Result<PathBuf> {
    let path = match std::env::var("CHATMEM_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .context("Failed to determine home directory")?;
            PathBuf::from(home).join(".chatmem")
        }
    };

    std::fs::create_dir_all(&path).context("Failed to create application directory")?;

    Ok(path)
}

/// Get the config file path (~/.chatmem/config.json)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("config.json"))
}

/// Get the directory holding one JSON memory file per conversation
pub fn get_memory_dir() -> Result<PathBuf> {
    let path = get_app_dir()?.join("chat_memory");
    std::fs::create_dir_all(&path).context("Failed to create memory directory")?;
    Ok(path)
}

/// Get the SQLite database path used by the sqlite storage backend
pub fn get_database_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("chatmem.db"))
}
