//! Drain Scheduling Module
//!
//! This module implements the time-driven drain used with the durable ledger:
//! - ScheduledDrain: fixed-delay loop that drains exactly `limit` PENDING rows
//!   per tick through the audit outbox
//! - DrainOutcome: what a tick did (deferred, or drained and delivered/failed)
//!
//! Stopping is cooperative: the loop checks its shutdown signal between
//! ticks, never in the middle of one.

mod drain;


pub use drain::{DrainOutcome, ScheduledDrain};
