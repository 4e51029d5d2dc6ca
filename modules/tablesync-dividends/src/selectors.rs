use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tablesync_common::{Event, QualifiedId, Version};
use tablesync_engine::{EventContext, Repository, Selector};
use tracing::debug;

use crate::ids::{reestry_id, status_id};
use crate::rows::DivStatus;

/// Fixed fan-out from one upstream table.
///
/// Fires on any non-error event about `trigger`: a scheduler payload or an
/// upstream `UpdateCompleted`. Everything else selects nothing.
#[derive(Debug, Clone)]
pub struct TriggerSelector {
    trigger: QualifiedId,
    targets: Vec<QualifiedId>,
}

impl TriggerSelector {
    pub fn new(trigger: QualifiedId, targets: Vec<QualifiedId>) -> Self {
        Self { trigger, targets }
    }
}

#[async_trait]
impl Selector for TriggerSelector {
    async fn select(&self, _ctx: &EventContext, event: &Event) -> Result<Vec<QualifiedId>> {
        if event.is_error() || event.qualified_id != self.trigger {
            return Ok(Vec::new());
        }
        Ok(self.targets.clone())
    }
}

/// Tickers awaiting a dividend check.
///
/// When the status table is updated, reads it and selects the registry
/// table of every ticker listed there. Foreign shares are skipped: the
/// registry site only covers domestic issuers.
pub struct StatusSelector {
    status: Arc<dyn Repository<DivStatus>>,
}

impl StatusSelector {
    pub fn new(status: Arc<dyn Repository<DivStatus>>) -> Self {
        Self { status }
    }
}

#[async_trait]
impl Selector for StatusSelector {
    async fn select(&self, ctx: &EventContext, event: &Event) -> Result<Vec<QualifiedId>> {
        if !event.completes(&status_id()) {
            return Ok(Vec::new());
        }

        let table = self
            .status
            .get(ctx, &Version::new(status_id(), event.date()))
            .await
            .context("can't load dividend status")?;

        let tickers: BTreeSet<&str> = table
            .rows
            .iter()
            .filter(|row| !row.foreign)
            .map(|row| row.ticker.as_str())
            .collect();

        debug!(tickers = tickers.len(), "Status selected tickers");

        Ok(tickers.into_iter().map(reestry_id).collect())
    }
}
