//! Balance tracker: a concurrency-safe account ledger whose pending
//! transactions are periodically drained, packed into size-capped batches
//! and submitted to an external audit sink.

pub mod types; // Transactions, batches, submissions and validation errors.
pub mod error; // Library error type.
pub mod config; // TOML configuration.
pub mod api; // REST boundary.
pub mod validation; // Ingestion rules.
pub mod ledger; // In-memory and durable ledgers.
pub mod pool; // Lock-free pending queue for the in-memory ledger.
pub mod batch; // First-Fit-Decreasing batch builder and threshold trigger.
pub mod audit; // Submitter, sinks and outbox.
pub mod storage; // SQLite pool, schema and unit of work.
pub mod scheduler; // Scheduled drain for the durable ledger.
pub mod service; // Composition root.

pub use types::*;
pub use error::{Error, Result};
pub use config::Config;
