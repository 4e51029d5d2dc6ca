//! The rule loop.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tablesync_common::{Event, QualifiedId, Row, SyncError, Table, Version};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::context::{ContextFactory, EventContext};
use crate::traits::{Gateway, Repository, Selector, Validator};

/// One named update policy over tables of `R`.
///
/// Read events → select ids → per-id load, fetch, validate, commit → emit.
/// Cheap to clone; clones share the same collaborators.
pub struct Rule<R: Row> {
    inner: Arc<Inner<R>>,
}

struct Inner<R: Row> {
    name: String,
    repository: Arc<dyn Repository<R>>,
    selector: Arc<dyn Selector>,
    gateway: Arc<dyn Gateway<R>>,
    validator: Arc<dyn Validator<R>>,
    append: bool,
    context_factory: ContextFactory,
}

impl<R: Row> Clone for Rule<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Outcome {
    Unchanged,
    Committed,
}

impl<R: Row> Rule<R> {
    /// `append` selects the commit policy: append rows after the overlap row,
    /// or replace the whole table.
    pub fn new(
        name: impl Into<String>,
        repository: impl Repository<R> + 'static,
        selector: impl Selector + 'static,
        gateway: impl Gateway<R> + 'static,
        validator: impl Validator<R> + 'static,
        append: bool,
        context_factory: ContextFactory,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                repository: Arc::new(repository),
                selector: Arc::new(selector),
                gateway: Arc::new(gateway),
                validator: Arc::new(validator),
                append,
                context_factory,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Runs until `inbound` is closed and every event read so far is fully
    /// handled. Closing `inbound` is a soft stop: in-flight work still
    /// finishes and still writes to `outbound`.
    pub async fn activate(&self, mut inbound: mpsc::Receiver<Event>, outbound: mpsc::Sender<Event>) {
        info!(rule = self.name(), "Rule started");

        let tracker = TaskTracker::new();

        while let Some(event) = inbound.recv().await {
            let rule = self.clone();
            let outbound = outbound.clone();

            tracker.spawn(async move {
                rule.handle_event(event, outbound).await;
            });
        }

        tracker.close();
        tracker.wait().await;

        info!(rule = self.name(), "Rule stopped");
    }

    async fn handle_event(&self, event: Event, outbound: mpsc::Sender<Event>) {
        let factory = &self.inner.context_factory;
        let ctx = match std::panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(ctx) => ctx,
            Err(panic) => {
                let err = SyncError::from_panic(panic);
                self.emit(&outbound, Event::error_occurred(&event, err)).await;
                return;
            }
        };
        let _release = ctx.release_on_drop();

        let ids = match self.select(&ctx, &event).await {
            Ok(ids) => ids,
            Err(err) => {
                self.emit(&outbound, Event::error_occurred(&event, err)).await;
                return;
            }
        };

        debug!(
            rule = self.name(),
            event = %event,
            selected = ids.len(),
            "Event selected tables"
        );

        let mut attempts = JoinSet::new();

        for id in ids {
            let version = Version::new(id, event.date());
            let rule = self.clone();
            let ctx = ctx.clone();
            let outbound = outbound.clone();

            attempts.spawn(async move {
                let outcome = AssertUnwindSafe(rule.update_to_version(&ctx, version.clone()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Some(Event::error_occurred(&version, SyncError::from_panic(panic)))
                    });

                if let Some(event) = outcome {
                    rule.emit(&outbound, event).await;
                }
            });
        }

        while let Some(joined) = attempts.join_next().await {
            if let Err(err) = joined {
                error!(rule = self.name(), error = %err, "Update task did not complete");
            }
        }
    }

    /// Selected ids without duplicates, in selector order.
    async fn select(&self, ctx: &EventContext, event: &Event) -> Result<Vec<QualifiedId>, SyncError> {
        let selected = AssertUnwindSafe(ctx.run(self.inner.selector.select(ctx, event)))
            .catch_unwind()
            .await;

        let ids = match selected {
            Err(panic) => return Err(SyncError::from_panic(panic)),
            Ok(Err(err)) => return Err(err),
            Ok(Ok(Err(err))) => return Err(SyncError::Selection(err)),
            Ok(Ok(Ok(ids))) => ids,
        };

        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }

    async fn update_to_version(&self, ctx: &EventContext, version: Version) -> Option<Event> {
        match self.try_update(ctx, &version).await {
            Ok(Outcome::Committed) => Some(Event::update_completed(&version)),
            Ok(Outcome::Unchanged) => {
                debug!(rule = self.name(), id = %version.id, "No new rows");
                None
            }
            Err(err) => Some(Event::error_occurred(&version, err)),
        }
    }

    async fn try_update(&self, ctx: &EventContext, version: &Version) -> Result<Outcome, SyncError> {
        let table = ctx
            .run(self.inner.repository.get(ctx, version))
            .await?
            .map_err(SyncError::Load)?;

        let mut rows = ctx
            .run(self.inner.gateway.get(ctx, &table, version.date))
            .await?
            .map_err(SyncError::Fetch)?;

        if rows.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        rows.sort_by_key(R::sort_key);

        self.inner
            .validator
            .validate(&table, &rows)
            .map_err(SyncError::Validation)?;

        // Commits are not raced against the context once started.
        let committed = if self.inner.append {
            let fresh = rows.split_off(1);
            self.inner
                .repository
                .append(ctx, Table::new(version.clone(), fresh))
                .await
        } else {
            self.inner
                .repository
                .replace(ctx, Table::new(version.clone(), rows))
                .await
        };
        committed.map_err(SyncError::Commit)?;

        Ok(Outcome::Committed)
    }

    async fn emit(&self, outbound: &mpsc::Sender<Event>, event: Event) {
        match event.error() {
            Some(err) => warn!(
                rule = self.name(),
                id = %event.qualified_id,
                kind = err.kind(),
                error = %err,
                "Rule emitted error event"
            ),
            None => debug!(rule = self.name(), event = %event, "Rule emitted event"),
        }

        if let Err(mpsc::error::SendError(event)) = outbound.send(event).await {
            error!(
                rule = self.name(),
                event = %event,
                "Outbound channel closed, event dropped"
            );
        }
    }
}
