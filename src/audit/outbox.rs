//! Audit Outbox Module
//!
//! Submissions are written to `audit_outbox` in the same unit of work that
//! marks their transactions PROCESSED. Delivery happens after commit:
//!
//! ```text
//! READY ──claim──▶ IN_FLIGHT ──ok──▶ DELIVERED
//!   ▲                  │
//!   └──── attempts < max ◀──err──┴──▶ FAILED (attempts == max)
//! ```
//!
//! A submission staged but never claimed (crash right after commit) is still
//! READY and goes out on the next tick. A submission left IN_FLIGHT by a crash
//! is never sent again automatically: nobody knows whether the sink saw it.

use crate::{Error, Result, Submission};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Delivery state of an outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Ready,
    InFlight,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Ready => "READY",
            DeliveryStatus::InFlight => "IN_FLIGHT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "READY" => Ok(DeliveryStatus::Ready),
            "IN_FLIGHT" => Ok(DeliveryStatus::InFlight),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(Error::Corrupt(format!("unknown delivery status: {}", other))),
        }
    }
}

/// One stored submission
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub submission: Submission,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

type OutboxRow = (String, String, String, i64, Option<String>);

fn decode(row: OutboxRow) -> Result<OutboxEntry> {
    let (submission_id, payload, status, attempts, last_error) = row;
    let id = Uuid::parse_str(&submission_id)
        .map_err(|e| Error::Corrupt(format!("bad submission id {}: {}", submission_id, e)))?;
    let mut submission: Submission = serde_json::from_str(&payload)?;
    submission.id = id;
    Ok(OutboxEntry {
        submission,
        status: DeliveryStatus::from_str(&status)?,
        attempts: attempts as u32,
        last_error,
    })
}

/// Durable queue of audit submissions
#[derive(Clone)]
pub struct Outbox {
    pool: SqlitePool,
    max_delivery_attempts: u32,
}

impl Outbox {
    pub fn new(pool: SqlitePool, max_delivery_attempts: u32) -> Self {
        Self {
            pool,
            max_delivery_attempts: max_delivery_attempts.max(1),
        }
    }

    /// Record a submission as READY inside the caller's unit of work
    pub async fn stage(conn: &mut SqliteConnection, submission: &Submission) -> Result<()> {
        let payload = serde_json::to_string(submission)?;
        sqlx::query(
            r#"
            INSERT INTO audit_outbox (submission_id, payload, status, attempts, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(submission.id.to_string())
        .bind(payload)
        .bind(DeliveryStatus::Ready.as_str())
        .bind(Utc::now().timestamp_micros())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Entries waiting for delivery, oldest first
    ///
    /// Rows that cannot be decoded are logged and left out.
    pub async fn ready(&self) -> Result<Vec<OutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT submission_id, payload, status, attempts, last_error
            FROM audit_outbox
            WHERE status = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(DeliveryStatus::Ready.as_str())
        .fetch_all(&self.pool)
        .await?;

        // An undecodable row stays READY for manual repair; the rest still go out
        let entries = rows
            .into_iter()
            .filter_map(|row| {
                let submission_id = row.0.clone();
                decode(row)
                    .map_err(|e| error!("Skipping outbox entry {}: {}", submission_id, e))
                    .ok()
            })
            .collect();
        Ok(entries)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>> {
        let row: Option<OutboxRow> = sqlx::query_as(
            r#"
            SELECT submission_id, payload, status, attempts, last_error
            FROM audit_outbox
            WHERE submission_id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    /// Move a READY entry to IN_FLIGHT and count the attempt
    ///
    /// # Returns
    /// `false` if another drainer claimed it first or it is no longer READY
    pub async fn claim(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE audit_outbox
            SET status = ?, attempts = attempts + 1
            WHERE submission_id = ? AND status = ?
            "#,
        )
        .bind(DeliveryStatus::InFlight.as_str())
        .bind(id.to_string())
        .bind(DeliveryStatus::Ready.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_delivered(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE audit_outbox SET status = ?, last_error = NULL WHERE submission_id = ?")
            .bind(DeliveryStatus::Delivered.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        info!("Outbox submission {} delivered", id);
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// The update runs to completion before the new status is read back, so a
    /// `Ready` result is already visible to the next `ready()` call.
    ///
    /// # Returns
    /// `Ready` if it will be retried, `Failed` once attempts are exhausted
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<DeliveryStatus> {
        let updated = sqlx::query(
            r#"
            UPDATE audit_outbox
            SET status = CASE WHEN attempts >= ? THEN ? ELSE ? END,
                last_error = ?
            WHERE submission_id = ?
            "#,
        )
        .bind(self.max_delivery_attempts as i64)
        .bind(DeliveryStatus::Failed.as_str())
        .bind(DeliveryStatus::Ready.as_str())
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::Corrupt(format!("outbox entry {} not found", id)));
        }

        let status: String =
            sqlx::query_scalar("SELECT status FROM audit_outbox WHERE submission_id = ?")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await?;

        let status = DeliveryStatus::from_str(&status)?;
        if status == DeliveryStatus::Failed {
            warn!("Outbox submission {} failed permanently: {}", id, error);
        }
        Ok(status)
    }
}
