//! Controller configuration
//!
//! Read once at startup from environment variables:
//! - `SYNC_TICK_SECONDS`: how often the scheduler scans connections (default 60)
//! - `SYNC_RUN_TIMEOUT_SECONDS`: upper bound for one connection's run (default 600)
//! - `IPAM_SEED_FILE`: optional JSON seed loaded into the in-memory store
//! - `LOG_FORMAT`: `text` (default) or `json`

use crate::error::SyncError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(600);

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often due connections are looked up.
    pub tick_interval: Duration,

    /// Time budget of a single connection's run.
    pub run_timeout: Duration,

    pub seed_file: Option<PathBuf>,

    pub log_format: LogFormat,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            seed_file: None,
            log_format: LogFormat::Text,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset and empty values take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("SYNC_TICK_SECONDS") {
            config.tick_interval = parse_seconds("SYNC_TICK_SECONDS", &raw)?;
        }
        if let Some(raw) = get("SYNC_RUN_TIMEOUT_SECONDS") {
            config.run_timeout = parse_seconds("SYNC_RUN_TIMEOUT_SECONDS", &raw)?;
        }
        config.seed_file = get("IPAM_SEED_FILE").map(PathBuf::from);
        if let Some(raw) = get("LOG_FORMAT") {
            config.log_format = match raw.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(SyncError::InvalidConfig(format!(
                        "LOG_FORMAT must be 'text' or 'json', got '{}'",
                        other
                    )))
                }
            };
        }
        Ok(config)
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, SyncError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(SyncError::InvalidConfig(format!("{} must be greater than zero", key))),
        Ok(seconds) => Ok(Duration::from_secs(seconds)),
        Err(e) => Err(SyncError::InvalidConfig(format!("{} '{}': {}", key, raw, e))),
    }
}
