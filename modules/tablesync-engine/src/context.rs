//! Per-event cancellation and deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tablesync_common::SyncError;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Bounded working context for one triggering event.
///
/// Cloned into every unit of work the event fans out to. Cancelling one
/// event's context never touches another's.
#[derive(Debug, Clone)]
pub struct EventContext {
    token: CancellationToken,
    deadline: Instant,
}

impl EventContext {
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the context when the returned guard drops.
    pub fn release_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Drives `fut` unless the context is cancelled or its deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SyncError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(SyncError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// Builds a fresh context for every event a rule reads.
pub type ContextFactory = Arc<dyn Fn() -> EventContext + Send + Sync>;

/// Factory giving every event `timeout` to finish.
pub fn timeout_factory(timeout: Duration) -> ContextFactory {
    Arc::new(move || EventContext::with_timeout(timeout))
}
