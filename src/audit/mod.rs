//! Audit Submission Module
//!
//! Everything between a drained transaction set and the external audit sink:
//! - `AuditSubmitter`: turns a drained set into a `Submission` and delivers it once
//! - `AuditSink`: the black-box destination (log, file, HTTP, in-memory)
//! - `Outbox`: durable record of submissions so delivery survives a crash
//!   between "mark processed" and "sink called"

mod outbox;
mod sink;
mod submitter;

pub use outbox::{DeliveryStatus, Outbox, OutboxEntry};
pub use sink::{AuditSink, FileAuditSink, HttpAuditSink, LogAuditSink, MemoryAuditSink, create_sink};
pub use submitter::AuditSubmitter;
