//! Audit sinks
//!
//! The sink receives `{ "batches": [ { "totalAbsoluteValue", "count" }, ... ] }`
//! in batch creation order. The submission id travels beside the payload.

use crate::config::{AuditConfig, SinkKind};
use crate::{Error, Result, Submission};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;

/// Destination for audit submissions
///
/// A returned error means the sink did not accept the submission.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Factory function to create a sink from configuration
pub fn create_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>> {
    let sink: Arc<dyn AuditSink> = match config.sink {
        SinkKind::Log => Arc::new(LogAuditSink),
        SinkKind::File => Arc::new(FileAuditSink::new(config.sink_dir.clone())),
        SinkKind::Http => {
            let url = config.sink_url.clone().ok_or_else(|| {
                Error::InvalidConfig("audit.sink_url is required for the http sink".to_string())
            })?;
            Arc::new(HttpAuditSink::new(url))
        }
    };
    Ok(sink)
}

/// Writes the payload to the log
#[derive(Debug, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn submit(&self, submission: &Submission) -> Result<()> {
        let json = serde_json::to_string_pretty(submission)?;
        info!("Audit System Submission {}:\n{}", submission.id, json);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Writes each submission to its own JSON file
#[derive(Debug)]
pub struct FileAuditSink {
    dir: PathBuf,
}

impl FileAuditSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_name(submission: &Submission) -> String {
        format!(
            "audit_submission_{}_{}.json",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            submission.id
        )
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn submit(&self, submission: &Submission) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(submission));
        let json = serde_json::to_string_pretty(submission)?;
        tokio::fs::write(&path, json).await?;
        info!("Audit submission written to file: {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// POSTs the payload to an HTTP endpoint
///
/// The submission id is sent as `Idempotency-Key` so the receiver can drop
/// a redelivered submission.
#[derive(Debug)]
pub struct HttpAuditSink {
    client: reqwest::Client,
    url: String,
}

impl HttpAuditSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn submit(&self, submission: &Submission) -> Result<()> {
        self.client
            .post(&self.url)
            .header("Idempotency-Key", submission.id.to_string())
            .json(submission)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Keeps submissions in memory
///
/// Can be told to fail the next N calls, which is how drain tests exercise
/// the failure paths.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    received: Mutex<Vec<Submission>>,
    failures_left: AtomicU32,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` submissions
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Submission> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn submit(&self, submission: &Submission) -> Result<()> {
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::Submission("audit sink unavailable".to_string()));
        }
        self.received.lock().push(submission.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Batch;
    use rust_decimal::Decimal;

    fn submission() -> Submission {
        Submission::new(vec![Batch {
            total_absolute_value: Decimal::new(500, 0),
            count: 2,
        }])
    }

    #[tokio::test]
    async fn test_file_sink_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAuditSink::new(dir.path().join("audit-logs"));
        let submission = submission();

        sink.submit(&submission).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path().join("audit-logs")).unwrap();
        let path = entries.next().unwrap().unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(&format!("{}.json", submission.id)));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["batches"][0]["count"], 2);
    }

    #[tokio::test]
    async fn test_memory_sink_fails_then_recovers() {
        let sink = MemoryAuditSink::new();
        sink.fail_next(1);

        assert!(sink.submit(&submission()).await.is_err());
        assert!(sink.submit(&submission()).await.is_ok());
        assert_eq!(sink.received().len(), 1);
    }

    #[test]
    fn test_factory_selects_sink() {
        let config = AuditConfig::default();
        assert_eq!(create_sink(&config).unwrap().name(), "log");

        let config = AuditConfig {
            sink: SinkKind::Http,
            sink_url: None,
            ..AuditConfig::default()
        };
        assert!(create_sink(&config).is_err());
    }
}
