//! SQLite database connection management.
//!
//! Provides a connection pool to the metadata database with WAL mode and
//! foreign-key enforcement enabled. The database file and its parent
//! directories are created automatically if they don't exist.
//!
//! # Foreign keys
//!
//! SQLite only honours `FOREIGN KEY` clauses (and therefore the
//! `ON DELETE CASCADE` on `image_tags`) when `PRAGMA foreign_keys` is on for
//! the connection, so every pooled connection is opened with it.
//!
//! # Connection Pool
//!
//! Uses `sqlx::SqlitePool` with up to 5 concurrent connections. HTTP
//! handlers acquire one connection per request; it goes back to the pool
//! when the handler returns, on success and failure alike.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured SQLite database.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// database cannot be opened.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// In-memory pool for unit tests. A single connection keeps the database
/// alive for the lifetime of the pool.
#[cfg(test)]
pub(crate) async fn connect_in_memory() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}
