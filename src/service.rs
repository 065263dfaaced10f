//! Account Service Module
//!
//! Composition root for one account. `assemble` picks the ledger from
//! `ledger.mode` and wires the matching drain:
//! - `in_memory`: `InMemoryLedger` + `ThresholdTrigger` run after every record
//! - `durable`: `SqliteLedger` + `ScheduledDrain` returned for the caller to spawn

use crate::{
    Config, Result, Transaction,
    audit::{AuditSink, AuditSubmitter, Outbox},
    batch::{BatchBuilder, ThresholdTrigger},
    config::LedgerMode,
    ledger::{InMemoryLedger, Ledger, SqliteLedger},
    scheduler::ScheduledDrain,
    storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Ingestion and balance query for one account
#[derive(Clone)]
pub struct AccountService {
    ledger: Arc<dyn Ledger>,
    trigger: Option<Arc<ThresholdTrigger>>,
}

impl AccountService {
    pub fn new(ledger: Arc<dyn Ledger>, trigger: Option<Arc<ThresholdTrigger>>) -> Self {
        Self { ledger, trigger }
    }

    /// Apply a validated transaction and run the threshold trigger, if any
    ///
    /// # Returns
    /// The balance right after this transaction
    pub async fn record(&self, tx: &Transaction) -> Result<Decimal> {
        let balance = self.ledger.apply(tx).await?;
        info!(
            "Recorded transaction Id {} on {} ledger",
            tx.transaction_id,
            self.ledger.name()
        );

        if let Some(trigger) = &self.trigger {
            trigger.evaluate().await;
        }

        Ok(balance)
    }

    pub async fn balance(&self) -> Result<Decimal> {
        self.ledger.current_balance().await
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }
}

/// Everything `main` needs to run
pub struct Assembly {
    pub service: AccountService,
    /// Present in durable mode only
    pub scheduled_drain: Option<ScheduledDrain>,
}

/// Build the service and its drain from configuration
///
/// # Arguments
/// * `config` - Validated configuration
/// * `sink` - Destination for audit submissions
pub async fn assemble(config: &Config, sink: Arc<dyn AuditSink>) -> Result<Assembly> {
    config.validate()?;

    let builder = BatchBuilder::new(config.audit.max_amount_per_batch)?;
    let submitter = Arc::new(AuditSubmitter::new(builder, sink));
    let limit = config.audit.transaction_limit;

    match config.ledger.mode {
        LedgerMode::InMemory => {
            let ledger = Arc::new(InMemoryLedger::new(config.ledger.account_id.clone()));
            let trigger = Arc::new(ThresholdTrigger::new(ledger.pending_pool(), limit, submitter));
            info!("Using in-memory ledger with threshold trigger (limit {})", limit);

            Ok(Assembly {
                service: AccountService::new(ledger, Some(trigger)),
                scheduled_drain: None,
            })
        }
        LedgerMode::Durable => {
            let pool = storage::connect(&config.database).await?;
            let ledger = Arc::new(SqliteLedger::new(
                pool.clone(),
                config.ledger.account_id.clone(),
                config.database.max_lock_retries,
            ));
            let drain = ScheduledDrain::new(
                ledger.clone(),
                submitter,
                Outbox::new(pool, config.audit.max_delivery_attempts),
                limit,
                config.scheduler.interval(),
            );
            info!(
                "Using durable ledger with scheduled drain (limit {}, every {}ms)",
                limit, config.scheduler.delay_ms
            );

            Ok(Assembly {
                service: AccountService::new(ledger, None),
                scheduled_drain: Some(drain),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::config::DatabaseConfig;

    #[tokio::test]
    async fn test_in_memory_assembly_drains_on_limit() {
        let mut config = Config::default();
        config.audit.transaction_limit = 2;
        let sink = Arc::new(MemoryAuditSink::new());

        let assembly = assemble(&config, sink.clone()).await.unwrap();
        assert!(assembly.scheduled_drain.is_none());

        let service = assembly.service;
        service
            .record(&Transaction::new("CRE-1", Decimal::new(25052, 2)))
            .await
            .unwrap();
        assert!(sink.received().is_empty());

        let balance = service
            .record(&Transaction::new("DEB-1", Decimal::new(-5052, 2)))
            .await
            .unwrap();

        assert_eq!(balance, Decimal::new(200, 0));
        assert_eq!(sink.received().len(), 1);
        assert_eq!(service.ledger().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_durable_assembly_returns_drain() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.ledger.mode = LedgerMode::Durable;
        config.audit.transaction_limit = 1;
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("service.db").display()),
            ..DatabaseConfig::default()
        };
        let sink = Arc::new(MemoryAuditSink::new());

        let assembly = assemble(&config, sink.clone()).await.unwrap();
        let drain = assembly.scheduled_drain.unwrap();
        assert_eq!(assembly.service.ledger().name(), "durable");

        assembly
            .service
            .record(&Transaction::new("CRE-1", Decimal::new(300, 0)))
            .await
            .unwrap();
        // Durable mode never drains on ingestion
        assert!(sink.received().is_empty());

        drain.tick().await.unwrap();
        assert_eq!(sink.received().len(), 1);
    }
}
