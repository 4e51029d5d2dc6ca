//! Reusable validators for the two commit policies.

use anyhow::{bail, Result};
use tablesync_common::{Row, Table};

use crate::traits::Validator;

/// Append-mode check: the first fetched row must repeat the last stored row.
///
/// An empty stored table has nothing to continue from, so any batch passes;
/// the engine still drops the first row as the overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendContinuity;

impl<R: Row> Validator<R> for AppendContinuity {
    fn validate(&self, table: &Table<R>, rows: &[R]) -> Result<()> {
        let Some(last) = table.last_row() else {
            return Ok(());
        };

        match rows.first() {
            Some(first) if first == last => Ok(()),
            Some(first) => bail!(
                "{}: fetched rows do not continue stored table: last stored {:?}, first fetched {:?}",
                table.version.id,
                last,
                first
            ),
            None => bail!("{}: no overlap row fetched", table.version.id),
        }
    }
}

/// Replace-mode check: sort keys strictly ascend, so no key repeats.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueKeys;

impl<R: Row> Validator<R> for UniqueKeys {
    fn validate(&self, table: &Table<R>, rows: &[R]) -> Result<()> {
        for pair in rows.windows(2) {
            if pair[0].sort_key() >= pair[1].sort_key() {
                bail!(
                    "{}: rows out of order or duplicated: {:?} then {:?}",
                    table.version.id,
                    pair[0],
                    pair[1]
                );
            }
        }
        Ok(())
    }
}
