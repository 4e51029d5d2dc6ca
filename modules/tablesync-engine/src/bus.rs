//! Wiring many rules onto one event stream.
//!
//! Every event published to the bus, and every event a rule emits, is
//! delivered to every rule and to every subscriber. Completions of one rule
//! therefore trigger the rules downstream of it. The graph must be acyclic.

use tablesync_common::{EngineConfig, Event, Row};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::rule::Rule;

struct Route {
    rule: String,
    inbound: mpsc::Sender<Event>,
}

/// Bus under construction: register rules, then [`Bus::start`].
pub struct Bus {
    capacity: usize,
    merged_tx: mpsc::Sender<Event>,
    merged_rx: mpsc::Receiver<Event>,
    routes: Vec<Route>,
    feed: broadcast::Sender<Event>,
    tracker: TaskTracker,
}

impl Bus {
    /// `capacity` bounds every queue; a full queue stalls its producers.
    pub fn new(capacity: usize) -> Self {
        let (merged_tx, merged_rx) = mpsc::channel(capacity);
        let (feed, _) = broadcast::channel(capacity);
        Self {
            capacity,
            merged_tx,
            merged_rx,
            routes: Vec::new(),
            feed,
            tracker: TaskTracker::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    /// Starts `rule` on its own task, reading from a dedicated queue.
    pub fn spawn_rule<R: Row>(&mut self, rule: Rule<R>) {
        let (inbound, rx) = mpsc::channel(self.capacity);
        let outbound = self.merged_tx.clone();

        self.routes.push(Route {
            rule: rule.name().to_string(),
            inbound,
        });
        self.tracker.spawn(async move {
            rule.activate(rx, outbound).await;
        });
    }

    /// Every event that passes through the bus. Slow subscribers lag and
    /// skip events instead of stalling the rules.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.feed.subscribe()
    }

    pub fn start(self) -> BusHandle {
        let Bus {
            merged_tx,
            merged_rx,
            routes,
            feed,
            tracker,
            ..
        } = self;

        info!(rules = routes.len(), "Bus started");

        let stop = CancellationToken::new();
        tracker.spawn(dispatch(merged_rx, routes, feed.clone(), stop.clone()));
        tracker.close();

        BusHandle {
            publisher: merged_tx,
            feed,
            stop,
            tracker,
        }
    }
}

/// Running bus.
pub struct BusHandle {
    publisher: mpsc::Sender<Event>,
    feed: broadcast::Sender<Event>,
    stop: CancellationToken,
    tracker: TaskTracker,
}

impl BusHandle {
    /// Injects an event, typically a trigger from an external scheduler.
    pub async fn publish(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.publisher.send(event).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.feed.subscribe()
    }

    /// Routes everything already queued, closes the rule inputs and waits
    /// for every rule to drain. Events emitted during the drain still reach
    /// subscribers but no longer reach rules.
    pub async fn shutdown(self) {
        let BusHandle {
            publisher,
            stop,
            tracker,
            ..
        } = self;

        stop.cancel();
        drop(publisher);
        tracker.wait().await;

        info!("Bus stopped");
    }
}

async fn dispatch(
    mut merged: mpsc::Receiver<Event>,
    mut routes: Vec<Route>,
    feed: broadcast::Sender<Event>,
    stop: CancellationToken,
) {
    let mut stopping = false;

    loop {
        tokio::select! {
            biased;
            received = merged.recv() => {
                let Some(event) = received else {
                    break;
                };

                debug!(event = %event, "Bus dispatching event");

                // No subscribers is fine.
                let _ = feed.send(event.clone());

                for route in &routes {
                    if route.inbound.send(event.clone()).await.is_err() {
                        warn!(rule = route.rule.as_str(), "Rule input closed, event not delivered");
                    }
                }
            }
            _ = stop.cancelled(), if !stopping => {
                stopping = true;
                routes.clear();
                info!("Bus closing rule inputs");
            }
        }
    }

    debug!("Bus dispatcher finished");
}
