//! Configuration Module
//!
//! This module defines all configuration structures for the balance tracker.
//! Configuration is loaded from TOML files and parsed using serde.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides the configuration file path
pub const CONFIG_PATH_ENV: &str = "BALANCE_TRACKER_CONFIG";

/// Main configuration structure
///
/// Contains all configuration sections for the balance tracker.
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [ledger]
/// mode = "durable"
/// account_id = "ACC123456"
///
/// [audit]
/// transaction_limit = 1000
/// max_amount_per_batch = 1000000
///
/// [scheduler]
/// delay_ms = 5000
///
/// [api]
/// host = "127.0.0.1"
/// port = 8080
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub audit: AuditConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
}

/// Which ledger implementation backs the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    /// Atomic in-process balance, drained by the threshold trigger
    InMemory,
    /// SQLite-backed balance, drained by the scheduled poller
    Durable,
}

/// Ledger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mode: LedgerMode,
    /// Account the balance row is keyed by; callers never send it
    pub account_id: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::InMemory,
            account_id: "ACC123456".to_string(),
        }
    }
}

/// What happens to a transaction larger than the batch cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Accept it; it forms a batch of its own that exceeds the cap
    #[default]
    Singleton,
    /// Reject it at ingestion as a validation failure
    Reject,
}

/// Where submissions are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Log,
    File,
    Http,
}

/// Audit submission configuration
///
/// # Fields
/// - `transaction_limit`: Number of pending transactions drained together
/// - `max_amount_per_batch`: Cap on the absolute aggregate of a batch
/// - `max_delivery_attempts`: Outbox delivery attempts per submission (1 = at most once)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub transaction_limit: usize,
    pub max_amount_per_batch: Decimal,
    pub oversize_policy: OversizePolicy,
    pub max_delivery_attempts: u32,
    pub sink: SinkKind,
    pub sink_dir: PathBuf,
    pub sink_url: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            transaction_limit: 1000,
            max_amount_per_batch: Decimal::new(1_000_000, 0),
            oversize_policy: OversizePolicy::Singleton,
            max_delivery_attempts: 1,
            sink: SinkKind::Log,
            sink_dir: PathBuf::from("audit-logs"),
            sink_url: None,
        }
    }
}

/// Scheduled drain configuration (durable mode only)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub delay_ms: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { delay_ms: 5000 }
    }
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on
/// - `min_amount` / `max_amount`: Accepted range for the absolute transaction amount
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            min_amount: Decimal::new(1000, 2),
            max_amount: Decimal::new(50000000, 2),
        }
    }
}

/// Database configuration
///
/// Settings for the durable ledger.
///
/// # Fields
/// - `url`: Database connection URL (e.g., "sqlite://balance-tracker.db")
/// - `busy_timeout_ms`: How long SQLite waits on a held write lock
/// - `max_lock_retries`: Retries of a unit of work that still hit lock contention
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub max_lock_retries: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://balance-tracker.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5000,
            max_lock_retries: 5,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded, parsed and validated
    /// * `Err` if the file couldn't be read, the TOML is invalid or a value is out of range
    ///
    /// # Example
    /// ```no_run
    /// let config = balance_tracker::Config::load("config/default.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Load from the path in `BALANCE_TRACKER_CONFIG`, falling back to `default_path`
    pub fn load_from_env_or(default_path: &str) -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| default_path.to_string());
        Self::load(&path)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the drain and batch logic cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.audit.transaction_limit == 0 {
            return Err(crate::Error::InvalidConfig(
                "audit.transaction_limit must be greater than zero".to_string(),
            ));
        }
        if self.audit.max_amount_per_batch <= Decimal::ZERO {
            return Err(crate::Error::InvalidConfig(
                "audit.max_amount_per_batch must be positive".to_string(),
            ));
        }
        if self.audit.max_delivery_attempts == 0 {
            return Err(crate::Error::InvalidConfig(
                "audit.max_delivery_attempts must be at least 1".to_string(),
            ));
        }
        if self.api.min_amount > self.api.max_amount {
            return Err(crate::Error::InvalidConfig(format!(
                "api.min_amount {} exceeds api.max_amount {}",
                self.api.min_amount, self.api.max_amount
            )));
        }
        if self.audit.sink == SinkKind::Http && self.audit.sink_url.is_none() {
            return Err(crate::Error::InvalidConfig(
                "audit.sink_url is required for the http sink".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.mode, LedgerMode::InMemory);
        assert_eq!(config.audit.max_delivery_attempts, 1);
    }

    #[test]
    fn test_parse_full_toml() {
        let config = Config::from_toml(
            r#"
            [ledger]
            mode = "durable"
            account_id = "ACC1"

            [audit]
            transaction_limit = 5
            max_amount_per_batch = 500
            oversize_policy = "reject"
            sink = "file"
            sink_dir = "/tmp/audit"

            [scheduler]
            delay_ms = 250

            [api]
            port = 9000
            min_amount = "1.00"
            max_amount = 1000

            [database]
            url = "sqlite://test.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.mode, LedgerMode::Durable);
        assert_eq!(config.ledger.account_id, "ACC1");
        assert_eq!(config.audit.transaction_limit, 5);
        assert_eq!(config.audit.max_amount_per_batch, Decimal::new(500, 0));
        assert_eq!(config.audit.oversize_policy, OversizePolicy::Reject);
        assert_eq!(config.audit.sink, SinkKind::File);
        assert_eq!(config.scheduler.interval(), Duration::from_millis(250));
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.database.url, "sqlite://test.db");
    }

    #[test]
    fn test_zero_limit_rejected() {
        let result = Config::from_toml("[audit]\ntransaction_limit = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_http_sink_requires_url() {
        let result = Config::from_toml("[audit]\nsink = \"http\"\n");
        assert!(result.is_err());
    }
}
