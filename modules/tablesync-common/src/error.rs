use std::any::Any;

use thiserror::Error;

/// Every failure the pipeline can report as an event.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The selector could not determine affected identifiers.
    #[error("selection failed: {0:#}")]
    Selection(#[source] anyhow::Error),

    /// Reading the stored table failed.
    #[error("load failed: {0:#}")]
    Load(#[source] anyhow::Error),

    /// The gateway could not fetch fresh rows.
    #[error("fetch failed: {0:#}")]
    Fetch(#[source] anyhow::Error),

    /// Fetched rows are inconsistent with the stored table.
    #[error("validation failed: {0:#}")]
    Validation(#[source] anyhow::Error),

    /// Append or replace failed.
    #[error("commit failed: {0:#}")]
    Commit(#[source] anyhow::Error),

    #[error("event context deadline exceeded")]
    DeadlineExceeded,

    #[error("event context cancelled")]
    Cancelled,

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("stale version: stored table is newer than {0}")]
    StaleVersion(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Short stable label used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Selection(_) => "selection",
            SyncError::Load(_) => "load",
            SyncError::Fetch(_) => "fetch",
            SyncError::Validation(_) => "validation",
            SyncError::Commit(_) => "commit",
            SyncError::DeadlineExceeded => "deadline",
            SyncError::Cancelled => "cancelled",
            SyncError::Panicked(_) => "panic",
            SyncError::StaleVersion(_) => "stale",
            SyncError::Config(_) => "config",
        }
    }

    /// Converts a caught panic payload into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        SyncError::Panicked(message)
    }
}
