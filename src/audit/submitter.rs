use super::AuditSink;
use crate::{Result, Submission, Transaction, batch::BatchBuilder};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds submissions from drained transactions and hands them to the sink
///
/// The submitter never retries on its own: one `deliver` call is one sink
/// call. Redelivery, where allowed, is the outbox's decision.
pub struct AuditSubmitter {
    builder: BatchBuilder,
    sink: Arc<dyn AuditSink>,
}

impl AuditSubmitter {
    pub fn new(builder: BatchBuilder, sink: Arc<dyn AuditSink>) -> Self {
        Self { builder, sink }
    }

    /// Partition a drained set into batches under a fresh submission id
    pub fn prepare(&self, transactions: &[Transaction]) -> Submission {
        let submission = Submission::new(self.builder.build_batches(transactions));
        debug!(
            "Prepared submission {}: {} transactions in {} batches",
            submission.id,
            transactions.len(),
            submission.batches.len()
        );
        submission
    }

    /// Call the sink exactly once
    pub async fn deliver(&self, submission: &Submission) -> Result<()> {
        info!(
            "Audit System Submission {} batch count = {} via {} sink",
            submission.id,
            submission.batches.len(),
            self.sink.name()
        );
        self.sink.submit(submission).await
    }

    /// Prepare and deliver in one step
    ///
    /// # Returns
    /// * `Ok(None)` when there was nothing to submit (the sink is not called)
    /// * `Ok(Some(submission))` after the sink accepted it
    /// * `Err` if the sink failed
    pub async fn submit(&self, transactions: &[Transaction]) -> Result<Option<Submission>> {
        if transactions.is_empty() {
            warn!("No transactions to submit to Audit System");
            return Ok(None);
        }

        let submission = self.prepare(transactions);
        self.deliver(&submission).await?;
        Ok(Some(submission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use rust_decimal::Decimal;

    fn submitter(sink: Arc<MemoryAuditSink>) -> AuditSubmitter {
        AuditSubmitter::new(BatchBuilder::new(Decimal::new(500, 0)).unwrap(), sink)
    }

    #[tokio::test]
    async fn test_empty_set_skips_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let result = submitter(sink.clone()).submit(&[]).await.unwrap();

        assert!(result.is_none());
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn test_submission_reaches_sink_once() {
        let sink = Arc::new(MemoryAuditSink::new());
        let txs = vec![
            Transaction::new("CRE-1", Decimal::new(300, 0)),
            Transaction::new("DEB-2", Decimal::new(-300, 0)),
        ];

        let submission = submitter(sink.clone()).submit(&txs).await.unwrap().unwrap();

        assert_eq!(submission.batches.len(), 2);
        assert_eq!(submission.transaction_count(), 2);
        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, submission.id);
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported() {
        let sink = Arc::new(MemoryAuditSink::new());
        sink.fail_next(1);
        let txs = vec![Transaction::new("CRE-1", Decimal::ONE)];

        assert!(submitter(sink.clone()).submit(&txs).await.is_err());
        assert!(sink.received().is_empty());
    }
}
