use anyhow::{bail, Result};
use tablesync_common::Table;
use tablesync_engine::{UniqueKeys, Validator};

use crate::rows::CurrencyDiv;

/// Registry dividends: one payment per date, every value positive.
pub fn validate_dividends(table: &Table<CurrencyDiv>, rows: &[CurrencyDiv]) -> Result<()> {
    UniqueKeys.validate(table, rows)?;

    if let Some(bad) = rows.iter().find(|div| !(div.value.is_finite() && div.value > 0.0)) {
        bail!(
            "{}: bad dividend {} {} on {}",
            table.version.id,
            bad.value,
            bad.currency,
            bad.date.format("%Y-%m-%d")
        );
    }

    Ok(())
}
