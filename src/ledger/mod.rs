//! Ledger Module
//!
//! The ledger owns the account balance and the log of transactions awaiting
//! audit. Two implementations sit behind the `Ledger` trait and one of them is
//! chosen at startup from `ledger.mode`:
//! - `InMemoryLedger`: compare-and-swap balance cell plus a lock-free pending queue
//! - `SqliteLedger`: balance and transaction rows in SQLite, each update in an
//!   exclusive unit of work
//!
//! Both report `NotFound` from `current_balance` until the first transaction
//! has been applied.

mod durable;
mod memory;


pub use durable::SqliteLedger;
pub use memory::InMemoryLedger;

use crate::{Result, Transaction};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Running balance plus pending-audit log for one account
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Add `tx.amount` to the balance and record the transaction as pending
    ///
    /// No sign or magnitude checks happen here; callers validate upstream.
    ///
    /// # Returns
    /// The balance right after this transaction was applied
    async fn apply(&self, tx: &Transaction) -> Result<Decimal>;

    /// Current balance, or `Error::NotFound` if nothing was ever applied
    async fn current_balance(&self) -> Result<Decimal>;

    /// Number of transactions still waiting to be drained
    async fn pending_count(&self) -> Result<usize>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
