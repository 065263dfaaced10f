//! Scheduled Drain Module
//!
//! Time-driven drain for the durable ledger. Each tick:
//! 1. Redeliver outbox entries still READY from earlier ticks
//! 2. Open a unit of work and fetch up to `limit` PENDING rows, oldest first
//! 3. Fewer than `limit` rows: roll back and wait for the next tick
//! 4. Exactly `limit` rows: build the submission, stage it in the outbox and
//!    mark the rows PROCESSED, all in the same commit
//! 5. After commit, claim the outbox entry and call the sink once

use crate::{
    Result, Submission,
    audit::{AuditSubmitter, DeliveryStatus, Outbox},
    ledger::SqliteLedger,
    storage::{UnitOfWork, with_lock_retry},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What one tick did with the pending rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Fewer than `limit` rows were pending; nothing changed
    Deferred { pending: usize },
    /// A submission was committed to the outbox and then delivered or not
    Drained {
        submission_id: Uuid,
        status: DeliveryStatus,
    },
}

enum Staged {
    Deferred(usize),
    Ready(Submission),
}

/// Fixed-delay drain of the durable ledger into the audit sink
pub struct ScheduledDrain {
    ledger: Arc<SqliteLedger>,
    submitter: Arc<AuditSubmitter>,
    outbox: Outbox,
    limit: usize,
    interval: Duration,
}

impl ScheduledDrain {
    /// Creates a new scheduled drain
    ///
    /// # Arguments
    /// * `ledger` - Durable ledger whose PENDING rows are drained
    /// * `submitter` - Builds and delivers submissions
    /// * `outbox` - Outbox on the same database as the ledger
    /// * `limit` - Exact number of rows per drained set
    /// * `interval` - Delay between the end of one tick and the start of the next
    pub fn new(
        ledger: Arc<SqliteLedger>,
        submitter: Arc<AuditSubmitter>,
        outbox: Outbox,
        limit: usize,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            submitter,
            outbox,
            limit,
            interval,
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Run ticks until `shutdown` fires
    ///
    /// The signal is only observed between ticks, so a tick that has started
    /// always finishes.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Scheduled drain started: limit={}, delay={}ms",
            self.limit,
            self.interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = sleep(self.interval) => {}
            }

            if let Err(e) = self.tick().await {
                error!("Scheduled drain tick failed: {}", e);
            }
        }

        info!("Scheduled drain stopped");
    }

    /// One full tick: redelivery, then at most one new drain
    ///
    /// A redelivery failure is logged and does not hold back the new drain.
    pub async fn tick(&self) -> Result<DrainOutcome> {
        if let Err(e) = self.redeliver_ready().await {
            error!("Outbox redelivery failed: {}", e);
        }
        self.drain_once().await
    }

    /// Stage and deliver one drained set if exactly `limit` rows are pending
    pub async fn drain_once(&self) -> Result<DrainOutcome> {
        let staged = with_lock_retry(self.ledger.max_lock_retries(), || self.stage()).await?;

        let submission = match staged {
            Staged::Deferred(pending) => {
                debug!(
                    "Found {} pending transactions (need {}), deferring",
                    pending, self.limit
                );
                return Ok(DrainOutcome::Deferred { pending });
            }
            Staged::Ready(submission) => submission,
        };

        info!(
            "Drained {} pending transactions into submission {}",
            submission.transaction_count(),
            submission.id
        );
        let status = self.deliver(&submission).await?;

        Ok(DrainOutcome::Drained {
            submission_id: submission.id,
            status,
        })
    }

    /// Deliver every READY outbox entry
    ///
    /// # Returns
    /// Number of entries the sink accepted
    pub async fn redeliver_ready(&self) -> Result<usize> {
        let mut delivered = 0;
        for entry in self.outbox.ready().await? {
            info!(
                "Redelivering submission {} (attempt {})",
                entry.submission.id,
                entry.attempts + 1
            );
            match self.deliver(&entry.submission).await {
                Ok(DeliveryStatus::Delivered) => delivered += 1,
                Ok(_) => {}
                Err(e) => error!("Redelivery of {} failed: {}", entry.submission.id, e),
            }
        }
        Ok(delivered)
    }

    async fn stage(&self) -> Result<Staged> {
        let mut uow = UnitOfWork::begin(self.ledger.pool()).await?;
        let drained = self.ledger.fetch_pending(uow.conn()?, self.limit).await?;

        if drained.len() != self.limit {
            uow.rollback().await?;
            return Ok(Staged::Deferred(drained.len()));
        }

        let submission = self.submitter.prepare(&drained);
        Outbox::stage(uow.conn()?, &submission).await?;
        self.ledger
            .mark_processed(uow.conn()?, &drained, submission.id)
            .await?;
        uow.commit().await?;

        Ok(Staged::Ready(submission))
    }

    async fn deliver(&self, submission: &Submission) -> Result<DeliveryStatus> {
        if !self.outbox.claim(submission.id).await? {
            debug!("Submission {} already claimed", submission.id);
            return Ok(DeliveryStatus::InFlight);
        }

        match self.submitter.deliver(submission).await {
            Ok(()) => {
                self.outbox.mark_delivered(submission.id).await?;
                Ok(DeliveryStatus::Delivered)
            }
            Err(e) => {
                warn!("Audit submission {} failed: {}", submission.id, e);
                self.outbox.mark_failed(submission.id, &e.to_string()).await
            }
        }
    }
}
