//! Storage Module
//!
//! SQLite persistence for the durable ledger:
//! - Connection pool setup and schema creation
//! - `UnitOfWork`: a transaction that holds the database write lock from its
//!   first statement until commit or rollback
//! - Bounded retry of units of work that hit lock contention

mod schema;
mod unit_of_work;

pub use schema::migrate;
pub use unit_of_work::{UnitOfWork, with_lock_retry};

use crate::{Result, config::DatabaseConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open the connection pool and make sure the schema exists
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    info!("Connected to {} ({} max connections)", config.url, config.max_connections);

    Ok(pool)
}
