use crate::Result;
use sqlx::SqlitePool;

/// Tables backing the durable ledger
///
/// Amounts are stored as decimal strings so no precision is lost;
/// `created_at` is microseconds since the epoch and `rowid` breaks ties.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS balance (
        account_id TEXT PRIMARY KEY,
        amount     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        transaction_id TEXT PRIMARY KEY,
        account_id     TEXT NOT NULL,
        amount         TEXT NOT NULL,
        created_at     INTEGER NOT NULL,
        audit_status   TEXT NOT NULL,
        submission_id  TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_transactions_pending
        ON transactions (account_id, audit_status, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_outbox (
        submission_id TEXT PRIMARY KEY,
        payload       TEXT NOT NULL,
        status        TEXT NOT NULL,
        attempts      INTEGER NOT NULL DEFAULT 0,
        created_at    INTEGER NOT NULL,
        last_error    TEXT
    )
    "#,
];

/// Create the tables if they do not exist yet
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
