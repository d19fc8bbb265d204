use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrations;

/// Create a connection pool and apply migrations.
///
/// The database file is created if missing. WAL journal mode and a busy
/// timeout keep concurrent in-process writers crash-consistent.
pub async fn create_pool(config: &StoreConfig) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    migrations::run_migrations(&pool).await?;

    info!(url = %config.database_url, "store ready");
    Ok(pool)
}
