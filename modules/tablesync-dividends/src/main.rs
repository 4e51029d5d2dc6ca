use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tablesync_common::{EngineConfig, Event};
use tablesync_dividends::fixture::{Fixture, FixtureRegistry, FixtureSecurities, FixtureStatus};
use tablesync_dividends::ids::trading_day_id;
use tablesync_dividends::replay::{watch, Patience};
use tablesync_dividends::{
    reestry_rule, securities_rule, status_rule, CurrencyDiv, DivStatus, Security,
};
use tablesync_engine::{timeout_factory, Bus, MemoryRepository};

/// Replay one trading day through the dividend chain using a JSON snapshot.
#[derive(Parser)]
struct Args {
    /// Snapshot with securities, closing dates and registry dividends.
    fixture: PathBuf,
    /// Trading day to replay (defaults to today).
    #[arg(long)]
    day: Option<NaiveDate>,
    /// Quiet period after which a chain without status changes is done.
    #[arg(long, default_value_t = 2)]
    settle_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tablesync=info".parse()?))
        .init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;
    let fixture = Arc::new(Fixture::load(&args.fixture)?);
    let day = match args.day {
        Some(day) => day
            .and_hms_opt(0, 0, 0)
            .context("invalid trading day")?
            .and_utc(),
        None => Utc::now(),
    };

    let securities: Arc<MemoryRepository<Security>> = Arc::new(MemoryRepository::new());
    let status: Arc<MemoryRepository<DivStatus>> = Arc::new(MemoryRepository::new());
    let dividends: Arc<MemoryRepository<CurrencyDiv>> = Arc::new(MemoryRepository::new());
    let factory = timeout_factory(config.event_timeout);

    let mut bus = Bus::from_config(&config);
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
    let mut feed = bus.subscribe();
    let bus = bus.start();

    info!(day = %day.format("%Y-%m-%d"), "Replaying trading day");
    bus.publish(Event::payload(trading_day_id(), day, serde_json::json!({})))
        .await
        .context("bus closed before the trading day was published")?;

    let patience = Patience {
        idle: config.event_timeout * 3,
        settle: Duration::from_secs(args.settle_secs),
    };
    let failures = watch(&mut feed, &*status, patience).await?;
    bus.shutdown().await;

    let tables: BTreeMap<String, Vec<CurrencyDiv>> = dividends
        .ids()
        .into_iter()
        .filter_map(|id| dividends.snapshot(&id).map(|table| (id.id, table.entity)))
        .collect();
    info!(tables = tables.len(), failures, "Replay finished");
    println!("{}", serde_json::to_string_pretty(&tables)?);

    Ok(())
}
