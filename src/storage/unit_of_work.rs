//! Unit of Work Module
//!
//! A unit of work starts with `BEGIN IMMEDIATE`, which takes the SQLite write
//! lock before the first read. Every read-modify-write done through it is
//! therefore exclusive across connections and processes until `commit` or
//! `rollback` releases the lock.

use crate::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exclusive database transaction
///
/// If dropped without `commit` or `rollback` (early `?` return, cancelled
/// future) the connection is detached from the pool and closed, which rolls
/// the transaction back and releases the lock.
pub struct UnitOfWork {
    conn: Option<PoolConnection<Sqlite>>,
}

impl UnitOfWork {
    /// Acquire a connection and take the write lock
    ///
    /// Waits up to the configured busy timeout if another unit of work holds it.
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    /// Connection to run statements on inside this unit of work
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or(Error::Storage(sqlx::Error::PoolClosed))
    }

    /// Commit and release the lock
    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    /// Discard all changes and release the lock
    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            // Transaction state is unknown; never hand this connection back
            drop(conn.detach());
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Unit of work dropped while open; discarding its connection");
            drop(conn.detach());
        }
    }
}

/// Run `op` again when it fails on lock contention
///
/// Each attempt is a fresh unit of work. Backoff doubles from 10ms.
/// Contention that outlasts `max_retries` is reported as `ConcurrencyConflict`.
pub async fn with_lock_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(e) if e.is_lock_contention() => {
                if attempt >= max_retries {
                    return Err(Error::ConcurrencyConflict(format!(
                        "gave up after {} retries: {}",
                        attempt, e
                    )));
                }
                attempt += 1;
                let backoff = Duration::from_millis(10u64 << attempt.min(6));
                warn!("Lock contention (attempt {}), retrying in {:?}: {}", attempt, backoff, e);
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}
