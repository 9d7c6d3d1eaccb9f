pub mod schema;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool},
    Pool, Sqlite,
};
use std::path::Path;

/// Open (creating if needed) the SQLite database at `db_path` and run migrations
pub async fn init_database(db_path: &Path) -> Result<Pool<Sqlite>> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    // Use SqliteConnectOptions to ensure the database file is created
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .context("Failed to connect to database")?;

    schema::create_tables(&pool).await?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(pool)
}
