use std::time::Duration;

use tracing::info;

use crate::error::SyncError;

const DEFAULT_EVENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Engine tuning loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Budget for handling one event, from selection to the last commit.
    pub event_timeout: Duration,
    /// Capacity of every bounded event queue.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_timeout: Duration::from_secs(DEFAULT_EVENT_TIMEOUT_SECS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load from `TABLESYNC_EVENT_TIMEOUT_SECS` and `TABLESYNC_CHANNEL_CAPACITY`,
    /// reading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            event_timeout_secs = config.event_timeout.as_secs(),
            channel_capacity = config.channel_capacity,
            "Engine config loaded"
        );
        Ok(config)
    }

    /// Same as [`EngineConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let event_timeout_secs = parse_or(
            &lookup,
            "TABLESYNC_EVENT_TIMEOUT_SECS",
            DEFAULT_EVENT_TIMEOUT_SECS,
        )?;
        let channel_capacity =
            parse_or(&lookup, "TABLESYNC_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?;

        if event_timeout_secs == 0 {
            return Err(SyncError::Config(
                "TABLESYNC_EVENT_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if channel_capacity == 0 {
            return Err(SyncError::Config(
                "TABLESYNC_CHANNEL_CAPACITY must be positive".to_string(),
            ));
        }

        Ok(Self {
            event_timeout: Duration::from_secs(event_timeout_secs),
            channel_capacity,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, SyncError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}
