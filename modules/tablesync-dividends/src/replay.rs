//! Following one replayed trading day until the chain settles.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use tablesync_common::{Event, Version};
use tablesync_engine::{EventContext, Repository};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::ids::{status_id, REESTRY_GROUP, SECURITIES_GROUP, STATUS_GROUP};
use crate::rows::DivStatus;

/// How long [`watch`] waits for the next event.
#[derive(Debug, Clone, Copy)]
pub struct Patience {
    /// Before anything moved, and while registry checks are outstanding.
    pub idle: Duration,
    /// Once the chain has moved but the status table has not reported.
    /// Unchanged links stay silent, so quiet here means done.
    pub settle: Duration,
}

/// Follows the chain until every registry check has reported, returning the
/// number of failed updates. Stops early when an upstream link fails, when
/// the chain settles without a status change, or when the feed goes quiet.
pub async fn watch(
    feed: &mut broadcast::Receiver<Event>,
    status: &dyn Repository<DivStatus>,
    patience: Patience,
) -> Result<usize> {
    let mut failures = 0;
    let mut pending: Option<usize> = None;
    let mut moved = false;

    loop {
        if pending == Some(0) {
            return Ok(failures);
        }

        let settling = moved && pending.is_none();
        let window = if settling { patience.settle } else { patience.idle };

        let event = match tokio::time::timeout(window, feed.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                warn!(missed, "Replay feed lagged");
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => return Ok(failures),
            Err(_) if settling => {
                info!("Chain settled without a status change");
                return Ok(failures);
            }
            Err(_) => {
                warn!("Replay went quiet before every table reported");
                return Ok(failures);
            }
        };
        info!(%event, "Event");
        moved = true;

        if event.is_error() {
            failures += 1;
        }

        match event.qualified_id.group.as_str() {
            SECURITIES_GROUP | STATUS_GROUP if event.is_error() => return Ok(failures),
            STATUS_GROUP => {
                let ctx = EventContext::with_timeout(patience.idle);
                let table = status
                    .get(&ctx, &Version::new(status_id(), event.date()))
                    .await?;
                let tickers: BTreeSet<&str> = table
                    .rows
                    .iter()
                    .filter(|row| !row.foreign)
                    .map(|row| row.ticker.as_str())
                    .collect();
                pending = Some(tickers.len());
            }
            REESTRY_GROUP => {
                pending = pending.map(|left| left.saturating_sub(1));
            }
            _ => {}
        }
    }
}
