//! End-to-end dividend chain over the bus with in-memory storage and
//! canned gateways.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tablesync_common::{Event, EventData, QualifiedId, Table, Version};
use tablesync_dividends::fixture::{Fixture, FixtureRegistry, FixtureSecurities, FixtureStatus};
use tablesync_dividends::ids::{reestry_id, securities_id, status_id, trading_day_id};
use tablesync_dividends::replay::{watch, Patience};
use tablesync_dividends::{
    reestry_rule, securities_rule, status_rule, Currency, CurrencyDiv, DivStatus, Security,
};
use tablesync_engine::{timeout_factory, Bus, EventContext, Gateway, MemoryRepository, Repository};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Canned gateways
// ---------------------------------------------------------------------------

struct ListingGateway(Vec<Security>);

#[async_trait]
impl Gateway<Security> for ListingGateway {
    async fn get(
        &self,
        _ctx: &EventContext,
        _table: &Table<Security>,
        _since: DateTime<Utc>,
    ) -> Result<Vec<Security>> {
        Ok(self.0.clone())
    }
}

/// Expected closing dates for every selected security, read from storage the
/// way the registry download filters by the tracked list.
struct StatusGateway {
    securities: Arc<MemoryRepository<Security>>,
    dates: HashMap<&'static str, DateTime<Utc>>,
}

#[async_trait]
impl Gateway<DivStatus> for StatusGateway {
    async fn get(
        &self,
        ctx: &EventContext,
        _table: &Table<DivStatus>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DivStatus>> {
        let securities = self
            .securities
            .get(ctx, &Version::new(securities_id(), since))
            .await?;

        Ok(securities
            .rows
            .iter()
            .filter(|sec| sec.selected)
            .filter_map(|sec| {
                self.dates
                    .get(sec.ticker.as_str())
                    .map(|date| DivStatus::for_security(sec, *date))
            })
            .collect())
    }
}

struct RegistryGateway(HashMap<&'static str, Vec<CurrencyDiv>>);

#[async_trait]
impl Gateway<CurrencyDiv> for RegistryGateway {
    async fn get(
        &self,
        _ctx: &EventContext,
        table: &Table<CurrencyDiv>,
        _since: DateTime<Utc>,
    ) -> Result<Vec<CurrencyDiv>> {
        self.0
            .get(table.version.id.id.as_str())
            .cloned()
            .with_context(|| format!("no registry page for {}", table.version.id))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn day(month: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, month, d, 0, 0, 0).unwrap()
}

fn security(ticker: &str, selected: bool) -> Security {
    Security {
        ticker: ticker.to_string(),
        board: "TQBR".to_string(),
        selected,
        lot: 1,
        instrument: "share".to_string(),
    }
}

fn div(d: u32, value: f64) -> CurrencyDiv {
    CurrencyDiv {
        date: day(7, d),
        value,
        currency: Currency::Rur,
    }
}

struct Pipeline {
    securities: Arc<MemoryRepository<Security>>,
    status: Arc<MemoryRepository<DivStatus>>,
    dividends: Arc<MemoryRepository<CurrencyDiv>>,
    bus: Bus,
}

fn pipeline(registry: HashMap<&'static str, Vec<CurrencyDiv>>) -> Pipeline {
    let securities: Arc<MemoryRepository<Security>> = Arc::new(MemoryRepository::new());
    let status: Arc<MemoryRepository<DivStatus>> = Arc::new(MemoryRepository::new());
    let dividends: Arc<MemoryRepository<CurrencyDiv>> = Arc::new(MemoryRepository::new());
    let factory = timeout_factory(Duration::from_secs(5));

    let mut bus = Bus::new(32);
    bus.spawn_rule(securities_rule(
        securities.clone(),
        ListingGateway(vec![
            security("SBER", true),
            security("SBERP", true),
            security("AAPL-RM", true),
            security("GAZP", false),
        ]),
        factory.clone(),
    ));
    bus.spawn_rule(status_rule(
        status.clone(),
        StatusGateway {
            securities: securities.clone(),
            dates: HashMap::from([
                ("SBER", day(7, 11)),
                ("SBERP", day(7, 11)),
                ("AAPL-RM", day(8, 15)),
                ("GAZP", day(7, 20)),
            ]),
        },
        factory.clone(),
    ));
    bus.spawn_rule(reestry_rule(
        dividends.clone(),
        status.clone(),
        RegistryGateway(registry),
        factory,
    ));

    Pipeline {
        securities,
        status,
        dividends,
        bus,
    }
}

/// Same wiring as the replay binary: every link answers from `fixture`.
fn fixture_pipeline(fixture: Fixture) -> Pipeline {
    let fixture = Arc::new(fixture);
    let securities: Arc<MemoryRepository<Security>> = Arc::new(MemoryRepository::new());
    let status: Arc<MemoryRepository<DivStatus>> = Arc::new(MemoryRepository::new());
    let dividends: Arc<MemoryRepository<CurrencyDiv>> = Arc::new(MemoryRepository::new());
    let factory = timeout_factory(Duration::from_secs(5));

    let mut bus = Bus::new(32);
    bus.spawn_rule(securities_rule(
        securities.clone(),
        FixtureSecurities(fixture.clone()),
        factory.clone(),
    ));
    bus.spawn_rule(status_rule(
        status.clone(),
        FixtureStatus::new(fixture.clone(), securities.clone()),
        factory.clone(),
    ));
    bus.spawn_rule(reestry_rule(
        dividends.clone(),
        status.clone(),
        FixtureRegistry(fixture),
        factory,
    ));

    Pipeline {
        securities,
        status,
        dividends,
        bus,
    }
}

fn snapshot() -> Fixture {
    Fixture {
        securities: vec![security("SBER", true), security("GAZP", false)],
        closing_dates: [("SBER".to_string(), day(7, 11))].into(),
        dividends: [("SBER".to_string(), vec![div(11, 18.7)])].into(),
    }
}

fn patience() -> Patience {
    Patience {
        idle: Duration::from_secs(60),
        settle: Duration::from_millis(200),
    }
}

fn trading_day_ended() -> Event {
    Event::payload(trading_day_id(), day(7, 1), serde_json::json!({"day": "2022-07-01"}))
}

/// Collects events until `expected` terminal events (completions or errors
/// about `group`) have been seen.
async fn collect(
    feed: &mut broadcast::Receiver<Event>,
    group: &str,
    expected: usize,
) -> Vec<Event> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut seen = Vec::new();
        while seen.len() < expected {
            let event = feed.recv().await.expect("bus feed closed");
            if event.qualified_id.group == group {
                seen.push(event);
            }
        }
        seen
    })
    .await
    .expect("chain did not settle")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn trading_day_cascades_to_registry_dividends() {
    let Pipeline {
        securities,
        status,
        dividends,
        bus,
    } = pipeline(HashMap::from([
        ("SBER", vec![div(11, 18.7), div(1, 12.0)]),
        ("SBERP", vec![div(11, 18.7)]),
    ]));
    let mut feed = bus.subscribe();
    let bus = bus.start();

    bus.publish(trading_day_ended()).await.unwrap();

    let reestry = collect(&mut feed, "reestry", 2).await;
    bus.shutdown().await;

    let mut completed: Vec<QualifiedId> = reestry
        .iter()
        .filter(|e| !e.is_error())
        .map(|e| e.qualified_id.clone())
        .collect();
    completed.sort();
    assert_eq!(completed, vec![reestry_id("SBER"), reestry_id("SBERP")]);

    assert_eq!(securities.snapshot(&securities_id()).unwrap().entity.len(), 4);

    // Unselected and foreign shares never reach the registry check.
    let tickers: Vec<String> = status
        .snapshot(&status_id())
        .unwrap()
        .entity
        .into_iter()
        .map(|s| s.ticker)
        .collect();
    assert_eq!(tickers, vec!["AAPL-RM", "SBER", "SBERP"]);

    assert_eq!(
        dividends.snapshot(&reestry_id("SBER")).unwrap().entity,
        vec![div(1, 12.0), div(11, 18.7)]
    );
    assert!(dividends.snapshot(&reestry_id("AAPL-RM")).is_none());
}

#[tokio::test]
async fn registry_failure_is_reported_per_ticker() {
    let Pipeline { dividends, bus, .. } = pipeline(HashMap::from([(
        "SBER",
        vec![div(11, 18.7), div(11, 18.7)],
    )]));
    let mut feed = bus.subscribe();
    let bus = bus.start();

    bus.publish(trading_day_ended()).await.unwrap();

    let mut reestry = collect(&mut feed, "reestry", 2).await;
    bus.shutdown().await;

    reestry.sort_by(|a, b| a.qualified_id.cmp(&b.qualified_id));
    let kinds: Vec<(&str, &str)> = reestry
        .iter()
        .map(|e| {
            (
                e.qualified_id.id.as_str(),
                e.error().map(|err| err.kind()).unwrap_or("completed"),
            )
        })
        .collect();

    // SBER has a duplicated date, SBERP has no registry page at all.
    assert_eq!(kinds, vec![("SBER", "validation"), ("SBERP", "fetch")]);
    assert!(dividends.is_empty());
}

#[tokio::test]
async fn replaying_unchanged_day_commits_nothing() {
    let Pipeline {
        status,
        dividends,
        bus,
        ..
    } = fixture_pipeline(snapshot());
    let mut feed = bus.subscribe();
    let bus = bus.start();

    bus.publish(trading_day_ended()).await.unwrap();
    let failures = tokio::time::timeout(Duration::from_secs(5), watch(&mut feed, &*status, patience()))
        .await
        .expect("first round did not settle")
        .unwrap();
    assert_eq!(failures, 0);
    assert_eq!(
        dividends.snapshot(&reestry_id("SBER")).unwrap().entity,
        vec![div(11, 18.7)]
    );

    bus.publish(trading_day_ended()).await.unwrap();
    bus.shutdown().await;

    let mut second_round = Vec::new();
    while let Ok(event) = feed.try_recv() {
        second_round.push(event);
    }

    assert_eq!(second_round.len(), 1, "only the trigger itself: {second_round:?}");
    assert_eq!(second_round[0].qualified_id, trading_day_id());
    assert!(!second_round
        .iter()
        .any(|e| matches!(e.data, EventData::UpdateCompleted)));
}

#[tokio::test]
async fn replay_settles_when_nothing_is_selected() {
    let mut nothing_selected = snapshot();
    nothing_selected.securities = vec![security("GAZP", false)];

    let Pipeline {
        securities,
        status,
        bus,
        ..
    } = fixture_pipeline(nothing_selected);
    let mut feed = bus.subscribe();
    let bus = bus.start();

    bus.publish(trading_day_ended()).await.unwrap();

    // The status link has no rows to report, so no status event ever comes;
    // watch must give up after the short settle window, not the idle one.
    let failures = tokio::time::timeout(Duration::from_secs(5), watch(&mut feed, &*status, patience()))
        .await
        .expect("replay waited for the idle window")
        .unwrap();
    bus.shutdown().await;

    assert_eq!(failures, 0);
    assert_eq!(securities.snapshot(&securities_id()).unwrap().entity.len(), 1);
    assert!(status.snapshot(&status_id()).is_none());
}
