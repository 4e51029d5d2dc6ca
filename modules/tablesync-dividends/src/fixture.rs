//! Offline gateways backed by a JSON snapshot.
//!
//! Lets the chain run end to end without exchange or registry access:
//! every gateway answers from the same [`Fixture`]. A gateway whose answer
//! already matches the stored table returns no rows, so replaying an
//! unchanged snapshot commits nothing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_common::{Row, Table, Version};
use tablesync_engine::{EventContext, Gateway, Repository};

use crate::ids::securities_id;
use crate::rows::{CurrencyDiv, DivStatus, Security};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub securities: Vec<Security>,
    /// Expected registry closing date per ticker.
    #[serde(default)]
    pub closing_dates: BTreeMap<String, DateTime<Utc>>,
    /// Registry dividends per ticker.
    #[serde(default)]
    pub dividends: BTreeMap<String, Vec<CurrencyDiv>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("can't read fixture {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("can't parse fixture {}", path.display()))
    }
}

/// `rows` in key order, or nothing when they equal what is stored.
fn changed<R: Row>(table: &Table<R>, mut rows: Vec<R>) -> Vec<R> {
    rows.sort_by_key(R::sort_key);
    if rows == table.rows {
        Vec::new()
    } else {
        rows
    }
}

pub struct FixtureSecurities(pub Arc<Fixture>);

#[async_trait]
impl Gateway<Security> for FixtureSecurities {
    async fn get(
        &self,
        _ctx: &EventContext,
        table: &Table<Security>,
        _since: DateTime<Utc>,
    ) -> Result<Vec<Security>> {
        Ok(changed(table, self.0.securities.clone()))
    }
}

/// Closing dates for the selected securities currently in storage.
pub struct FixtureStatus {
    fixture: Arc<Fixture>,
    securities: Arc<dyn Repository<Security>>,
}

impl FixtureStatus {
    pub fn new(fixture: Arc<Fixture>, securities: Arc<dyn Repository<Security>>) -> Self {
        Self {
            fixture,
            securities,
        }
    }
}

#[async_trait]
impl Gateway<DivStatus> for FixtureStatus {
    async fn get(
        &self,
        ctx: &EventContext,
        table: &Table<DivStatus>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DivStatus>> {
        let securities = self
            .securities
            .get(ctx, &Version::new(securities_id(), since))
            .await
            .context("can't load securities")?;

        let rows: Vec<DivStatus> = securities
            .rows
            .iter()
            .filter(|sec| sec.selected)
            .filter_map(|sec| {
                self.fixture
                    .closing_dates
                    .get(&sec.ticker)
                    .map(|date| DivStatus::for_security(sec, *date))
            })
            .collect();

        Ok(changed(table, rows))
    }
}

pub struct FixtureRegistry(pub Arc<Fixture>);

#[async_trait]
impl Gateway<CurrencyDiv> for FixtureRegistry {
    async fn get(
        &self,
        _ctx: &EventContext,
        table: &Table<CurrencyDiv>,
        _since: DateTime<Utc>,
    ) -> Result<Vec<CurrencyDiv>> {
        let ticker = &table.version.id.id;
        let rows = self
            .0
            .dividends
            .get(ticker)
            .cloned()
            .with_context(|| format!("no registry data for {ticker}"))?;

        Ok(changed(table, rows))
    }
}
