//! Threshold Trigger Module
//!
//! Event-driven drain for the in-memory ledger. After each applied
//! transaction the trigger checks, without locking, whether the pending pool
//! has reached the configured limit. Only then does it take the drain lock,
//! re-check, and pop exactly `limit` transactions. Batching and the sink call
//! run after the lock is released so ingestion never waits on the sink.

use crate::{Error, Submission, Transaction, audit::AuditSubmitter, pool::PendingPool};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result of one drained set
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The sink accepted the submission
    Submitted(Submission),
    /// The sink rejected it; the drained transactions are not re-queued
    Failed { drained: usize, error: Error },
}

/// Drains the pending pool each time it reaches `limit`
pub struct ThresholdTrigger {
    pending: Arc<PendingPool>,
    limit: usize,
    drain_lock: Mutex<()>,
    submitter: Arc<AuditSubmitter>,
}

impl ThresholdTrigger {
    /// Creates a new trigger
    ///
    /// # Arguments
    /// * `pending` - Pool filled by the in-memory ledger
    /// * `limit` - Exact size of every drained set (must be non-zero)
    /// * `submitter` - Builds and delivers the submission for a drained set
    pub fn new(pending: Arc<PendingPool>, limit: usize, submitter: Arc<AuditSubmitter>) -> Self {
        Self {
            pending,
            limit,
            drain_lock: Mutex::new(()),
            submitter,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drain and submit every complete set currently pending
    ///
    /// # Returns
    /// One outcome per drained set; empty if the pool was below the limit
    /// or another caller got there first
    pub async fn evaluate(&self) -> Vec<TriggerOutcome> {
        let mut outcomes = Vec::new();

        while let Some(drained) = self.try_extract() {
            let outcome = match self.submitter.submit(&drained).await {
                Ok(Some(submission)) => {
                    info!(
                        "Submitted {} transactions in {} batches (submission {})",
                        drained.len(),
                        submission.batches.len(),
                        submission.id
                    );
                    TriggerOutcome::Submitted(submission)
                }
                Ok(None) => continue,
                Err(e) => {
                    error!("Audit submission of {} transactions failed: {}", drained.len(), e);
                    TriggerOutcome::Failed {
                        drained: drained.len(),
                        error: e,
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Check-and-extract under the drain lock
    fn try_extract(&self) -> Option<Vec<Transaction>> {
        if self.limit == 0 || self.pending.len() < self.limit {
            return None;
        }

        let _guard = self.drain_lock.lock();
        if self.pending.len() < self.limit {
            debug!("Pending pool already drained by another caller");
            return None;
        }
        let drained = self.pending.take(self.limit);
        debug!("Drained {} transactions for audit", drained.len());
        Some(drained)
    }
}
