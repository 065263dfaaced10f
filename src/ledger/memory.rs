use super::Ledger;
use crate::{Error, Result, Transaction, pool::PendingPool};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// In-process ledger
///
/// The balance lives in an atomically swapped cell. `apply` runs a
/// compare-and-swap loop (`rcu`) so concurrent callers never lose an update.
/// The cell stays empty until the first transaction, which is how
/// `current_balance` tells "no history" apart from a zero balance.
pub struct InMemoryLedger {
    account_id: String,
    balance: ArcSwapOption<Decimal>,
    pending: Arc<PendingPool>,
}

impl InMemoryLedger {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            balance: ArcSwapOption::empty(),
            pending: Arc::new(PendingPool::new()),
        }
    }

    /// Queue shared with the threshold trigger
    pub fn pending_pool(&self) -> Arc<PendingPool> {
        self.pending.clone()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn apply(&self, tx: &Transaction) -> Result<Decimal> {
        let previous = self.balance.rcu(|current| {
            let base = current.as_deref().copied().unwrap_or(Decimal::ZERO);
            Some(Arc::new(base + tx.amount))
        });
        let updated = previous.as_deref().copied().unwrap_or(Decimal::ZERO) + tx.amount;

        self.pending.push(tx.clone());
        debug!(
            "Updated balance after transaction Id {}: {}",
            tx.transaction_id, updated
        );

        Ok(updated)
    }

    async fn current_balance(&self) -> Result<Decimal> {
        self.balance
            .load()
            .as_deref()
            .copied()
            .ok_or_else(|| Error::NotFound(self.account_id.clone()))
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.pending.len())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
