use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::QualifiedId;

/// Table `id` as of the trigger `date`. Derived per event, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub id: QualifiedId,
    pub date: DateTime<Utc>,
}

impl Version {
    pub fn new(id: QualifiedId, date: DateTime<Utc>) -> Self {
        Self { id, date }
    }
}

/// A domain row stored in a versioned table.
///
/// `sort_key` is the natural key (e.g. ticker then date). Fetched batches
/// are ordered by it before anything else looks at them.
pub trait Row: Clone + PartialEq + Debug + Send + Sync + 'static {
    type Key: Ord;

    fn sort_key(&self) -> Self::Key;
}

/// Unit of commit: the rows of one table at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<R> {
    pub version: Version,
    pub rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(version: Version, rows: Vec<R>) -> Self {
        Self { version, rows }
    }

    pub fn empty(version: Version) -> Self {
        Self::new(version, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_row(&self) -> Option<&R> {
        self.rows.last()
    }
}

/// Repository-side wrapper carrying the last update timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate<E> {
    pub timestamp: DateTime<Utc>,
    pub entity: E,
}

impl<E> Aggregate<E> {
    pub fn new(timestamp: DateTime<Utc>, entity: E) -> Self {
        Self { timestamp, entity }
    }

    /// True when `date` predates the stored update.
    pub fn is_newer_than(&self, date: DateTime<Utc>) -> bool {
        self.timestamp > date
    }
}
