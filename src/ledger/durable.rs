use super::Ledger;
use crate::storage::{UnitOfWork, with_lock_retry};
use crate::{AuditStatus, Error, PendingRecord, Result, Transaction};
use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite-backed ledger
///
/// One `balance` row per account and one `transactions` row per applied
/// transaction. The balance read, the balance write and the transaction insert
/// share one `UnitOfWork`, so the write lock is held from read to commit and
/// racing instances cannot lose updates.
pub struct SqliteLedger {
    pool: SqlitePool,
    account_id: String,
    max_lock_retries: u32,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, account_id: impl Into<String>, max_lock_retries: u32) -> Self {
        Self {
            pool,
            account_id: account_id.into(),
            max_lock_retries,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn max_lock_retries(&self) -> u32 {
        self.max_lock_retries
    }

    async fn apply_once(&self, tx: &Transaction) -> Result<Decimal> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO transactions (transaction_id, account_id, amount, created_at, audit_status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(&tx.transaction_id)
        .bind(&self.account_id)
        .bind(tx.amount.to_string())
        .bind(tx.created_at.timestamp_micros())
        .bind(AuditStatus::Pending.as_str())
        .execute(uow.conn()?)
        .await?;

        if inserted.rows_affected() == 0 {
            uow.rollback().await?;
            return Err(Error::DuplicateTransaction(tx.transaction_id.clone()));
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT amount FROM balance WHERE account_id = ?")
                .bind(&self.account_id)
                .fetch_optional(uow.conn()?)
                .await?;

        let current = match current {
            Some(raw) => Decimal::from_str(&raw)?,
            None => {
                info!("Initialized balance row for accountId: {}", self.account_id);
                Decimal::ZERO
            }
        };
        let updated = current + tx.amount;

        sqlx::query(
            r#"
            INSERT INTO balance (account_id, amount) VALUES (?, ?)
            ON CONFLICT (account_id) DO UPDATE SET amount = excluded.amount
            "#,
        )
        .bind(&self.account_id)
        .bind(updated.to_string())
        .execute(uow.conn()?)
        .await?;

        uow.commit().await?;
        Ok(updated)
    }

    /// Oldest pending transactions, at most `limit`
    ///
    /// Must run inside a `UnitOfWork` so the rows stay locked until it commits.
    pub(crate) async fn fetch_pending(
        &self,
        conn: &mut SqliteConnection,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT transaction_id, amount, created_at
            FROM transactions
            WHERE account_id = ? AND audit_status = ?
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(&self.account_id)
        .bind(AuditStatus::Pending.as_str())
        .bind(limit as i64)
        .fetch_all(conn)
        .await?;

        rows.into_iter()
            .map(|(transaction_id, amount, created_at)| {
                decode_transaction(transaction_id, &amount, created_at)
            })
            .collect()
    }

    /// Flip drained transactions to PROCESSED and link them to their submission
    pub(crate) async fn mark_processed(
        &self,
        conn: &mut SqliteConnection,
        transactions: &[Transaction],
        submission_id: Uuid,
    ) -> Result<()> {
        let submission_id = submission_id.to_string();
        for tx in transactions {
            sqlx::query(
                "UPDATE transactions SET audit_status = ?, submission_id = ? WHERE transaction_id = ?",
            )
            .bind(AuditStatus::Processed.as_str())
            .bind(&submission_id)
            .bind(&tx.transaction_id)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Stored record of one transaction, if it exists
    pub async fn record(&self, transaction_id: &str) -> Result<Option<PendingRecord>> {
        let row: Option<(String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT transaction_id, amount, created_at, audit_status
            FROM transactions
            WHERE transaction_id = ?
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(transaction_id, amount, created_at, status)| -> Result<PendingRecord> {
            Ok(PendingRecord {
                transaction: decode_transaction(transaction_id, &amount, created_at)?,
                status: AuditStatus::from_str(&status).map_err(Error::Corrupt)?,
            })
        })
        .transpose()
    }

    /// Audit status of one transaction, if it exists
    pub async fn status_of(&self, transaction_id: &str) -> Result<Option<AuditStatus>> {
        Ok(self.record(transaction_id).await?.map(|record| record.status))
    }
}

fn decode_transaction(transaction_id: String, amount: &str, created_at: i64) -> Result<Transaction> {
    let created_at = DateTime::from_timestamp_micros(created_at)
        .ok_or_else(|| Error::Corrupt(format!("bad timestamp on transaction {}", transaction_id)))?;
    Ok(Transaction {
        amount: Decimal::from_str(amount)?,
        transaction_id,
        created_at,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn apply(&self, tx: &Transaction) -> Result<Decimal> {
        let updated = with_lock_retry(self.max_lock_retries, || self.apply_once(tx)).await?;
        debug!(
            "Updated balance after transaction Id {}: {}",
            tx.transaction_id, updated
        );
        Ok(updated)
    }

    async fn current_balance(&self) -> Result<Decimal> {
        let amount: Option<String> =
            sqlx::query_scalar("SELECT amount FROM balance WHERE account_id = ?")
                .bind(&self.account_id)
                .fetch_optional(&self.pool)
                .await?;

        match amount {
            Some(raw) => Ok(Decimal::from_str(&raw)?),
            None => Err(Error::NotFound(self.account_id.clone())),
        }
    }

    async fn pending_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ? AND audit_status = ?",
        )
        .bind(&self.account_id)
        .bind(AuditStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    fn name(&self) -> &'static str {
        "durable"
    }
}
