//! Batch Module
//!
//! This module handles everything between a pending set and a submission:
//! - BatchBuilder: First-Fit-Decreasing partition of a drained set under a cap
//! - ThresholdTrigger: event-driven drain of the in-memory pending pool

mod builder;
mod trigger;

pub use builder::BatchBuilder;
pub use trigger::{ThresholdTrigger, TriggerOutcome};
