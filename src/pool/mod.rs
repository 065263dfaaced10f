//! Pending Pool Module
//!
//! This module holds the in-process log of applied transactions waiting to be
//! drained for audit. The durable ledger keeps its pending records in the
//! `transactions` table instead.

mod pending_pool;

pub use pending_pool::PendingPool;
