//! Repository implementations.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablesync_common::{Aggregate, QualifiedId, Row, SyncError, Table, Version};

use crate::context::EventContext;
use crate::traits::Repository;

// ---------------------------------------------------------------------------
// MemoryRepository (tests and local wiring, no database required)
// ---------------------------------------------------------------------------

/// In-memory versioned tables. Thread-safe.
///
/// Each table is an `Aggregate` stamped with the date of its last commit.
/// A commit for an older date than the stored one is refused; same or newer
/// dates win.
pub struct MemoryRepository<R> {
    tables: Mutex<HashMap<QualifiedId, Aggregate<Vec<R>>>>,
}

impl<R: Row> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Row> MemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `rows` for `id` as if committed at `timestamp`.
    pub fn seed(&self, id: QualifiedId, timestamp: DateTime<Utc>, rows: Vec<R>) {
        self.lock().insert(id, Aggregate::new(timestamp, rows));
    }

    /// Stored aggregate for `id` (for assertions and read-only callers).
    pub fn snapshot(&self, id: &QualifiedId) -> Option<Aggregate<Vec<R>>> {
        self.lock().get(id).cloned()
    }

    /// Identifiers of every stored table, sorted.
    pub fn ids(&self) -> Vec<QualifiedId> {
        let mut ids: Vec<QualifiedId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QualifiedId, Aggregate<Vec<R>>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, table: Table<R>, keep_existing: bool) -> Result<()> {
        let mut tables = self.lock();
        let Table { version, rows } = table;

        match tables.entry(version.id) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                if stored.is_newer_than(version.date) {
                    return Err(SyncError::StaleVersion(version.date.to_rfc3339()).into());
                }
                if keep_existing {
                    stored.entity.extend(rows);
                } else {
                    stored.entity = rows;
                }
                stored.timestamp = version.date;
            }
            Entry::Vacant(entry) => {
                entry.insert(Aggregate::new(version.date, rows));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<R: Row> Repository<R> for MemoryRepository<R> {
    async fn get(&self, _ctx: &EventContext, version: &Version) -> Result<Table<R>> {
        let rows = self
            .lock()
            .get(&version.id)
            .map(|stored| stored.entity.clone())
            .unwrap_or_default();
        Ok(Table::new(version.clone(), rows))
    }

    async fn append(&self, _ctx: &EventContext, table: Table<R>) -> Result<()> {
        self.commit(table, true)
    }

    async fn replace(&self, _ctx: &EventContext, table: Table<R>) -> Result<()> {
        self.commit(table, false)
    }
}
