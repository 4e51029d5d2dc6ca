//! Capability contracts a rule is assembled from.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablesync_common::{Event, QualifiedId, Row, Table, Version};

use crate::context::EventContext;

/// Maps a triggering event to the tables that must be re-evaluated.
///
/// An event the selector does not care about yields an empty list. Reads
/// only; an error aborts the whole event.
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(&self, ctx: &EventContext, event: &Event) -> Result<Vec<QualifiedId>>;
}

/// Fetches candidate rows from an external source.
///
/// `table` is the stored snapshot, `since` the trigger date. Calls for
/// different tables run concurrently and must not share mutable state.
#[async_trait]
pub trait Gateway<R: Row>: Send + Sync {
    async fn get(&self, ctx: &EventContext, table: &Table<R>, since: DateTime<Utc>)
        -> Result<Vec<R>>;
}

/// Accepts or rejects fetched rows against the stored table. Pure.
///
/// Rows arrive sorted by [`Row::sort_key`]. In append mode the first row is
/// the overlap with the stored table and is dropped after validation.
pub trait Validator<R: Row>: Send + Sync {
    fn validate(&self, table: &Table<R>, rows: &[R]) -> Result<()>;
}

impl<R, F> Validator<R> for F
where
    R: Row,
    F: Fn(&Table<R>, &[R]) -> Result<()> + Send + Sync,
{
    fn validate(&self, table: &Table<R>, rows: &[R]) -> Result<()> {
        self(table, rows)
    }
}

/// Versioned table storage.
///
/// Each call is atomic on its own; the engine never spans a transaction
/// across `get` and a commit.
#[async_trait]
pub trait Repository<R: Row>: Send + Sync {
    /// Stored table for `version.id`. Unknown tables come back empty.
    async fn get(&self, ctx: &EventContext, version: &Version) -> Result<Table<R>>;

    /// Adds `table.rows` after the stored rows.
    async fn append(&self, ctx: &EventContext, table: Table<R>) -> Result<()>;

    /// Overwrites the stored rows with `table.rows`.
    async fn replace(&self, ctx: &EventContext, table: Table<R>) -> Result<()>;
}

// Shared handles: a selector and a rule can read the same repository.
#[async_trait]
impl<R: Row, P: Repository<R> + ?Sized> Repository<R> for Arc<P> {
    async fn get(&self, ctx: &EventContext, version: &Version) -> Result<Table<R>> {
        (**self).get(ctx, version).await
    }

    async fn append(&self, ctx: &EventContext, table: Table<R>) -> Result<()> {
        (**self).append(ctx, table).await
    }

    async fn replace(&self, ctx: &EventContext, table: Table<R>) -> Result<()> {
        (**self).replace(ctx, table).await
    }
}
