//! Application configuration management.

use serde::Deserialize;

use crate::types::{OverflowPolicy, PoolOrder};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Allocation engine configuration.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Credit consumption configuration.
    #[serde(default)]
    pub credit: CreditConfig,
    /// Aging report configuration.
    #[serde(default)]
    pub aging: AgingConfig,
    /// Reconciliation configuration.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Allocation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    /// How many times a batch is re-run after a version conflict.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Overflow policy applied when a command does not choose one.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            overflow: OverflowPolicy::default(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

/// Credit consumption configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditConfig {
    /// Order in which notes and advances are drawn down.
    #[serde(default)]
    pub pool_order: PoolOrder,
}

/// A single aging bucket definition, in days past due.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketConfig {
    /// Display label.
    pub label: String,
    /// Inclusive lower bound; `None` means unbounded.
    #[serde(default)]
    pub lower_days: Option<i64>,
    /// Exclusive upper bound; `None` means unbounded.
    #[serde(default)]
    pub upper_days: Option<i64>,
}

impl BucketConfig {
    fn new(label: &str, lower_days: Option<i64>, upper_days: Option<i64>) -> Self {
        Self {
            label: label.to_string(),
            lower_days,
            upper_days,
        }
    }
}

/// Aging report configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgingConfig {
    /// Ordered bucket definitions.
    #[serde(default = "default_buckets")]
    pub buckets: Vec<BucketConfig>,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
        }
    }
}

/// Standard Current / 1-30 / 31-60 / 61-90 / 90+ buckets.
#[must_use]
pub fn default_buckets() -> Vec<BucketConfig> {
    vec![
        BucketConfig::new("Current", None, Some(1)),
        BucketConfig::new("1-30", Some(1), Some(31)),
        BucketConfig::new("31-60", Some(31), Some(61)),
        BucketConfig::new("61-90", Some(61), Some(91)),
        BucketConfig::new("90+", Some(91), None),
    ]
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Default deadline for building a statement, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "remit=info".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("REMIT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
