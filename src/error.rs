//! Error types for the balance tracker

use thiserror::Error;

/// Result type for ledger and drain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Balance tracker errors
#[derive(Error, Debug)]
pub enum Error {
    /// Balance queried before any transaction was applied
    #[error("Balance not found for account Id {0}")]
    NotFound(String),

    /// Transaction id already recorded by the durable ledger
    #[error("Transaction {0} has already been applied")]
    DuplicateTransaction(String),

    /// Lock contention that outlasted the retry budget
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Audit sink rejected or failed the submission
    #[error("Audit submission failed: {0}")]
    Submission(String),

    /// Database error
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Stored value could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the underlying cause is SQLite lock contention (BUSY / LOCKED)
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::ConcurrencyConflict(_) => true,
            Error::Storage(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, 5 | 6))
                .unwrap_or(false),
            Error::Storage(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Submission(err.to_string())
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}
