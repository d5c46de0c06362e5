//! Reconciled audit feed
//!
//! `AuditFeed` ties the pieces together:
//!
//! - the poll scheduler drives refresh cycles while the feed is active
//! - each cycle replaces the feed with the backend's list, then merges ledger
//!   history in the background
//! - the live subscriber prepends ledger events as they are pushed
//!
//! Consumers observe `FeedSnapshot`s through `subscribe()`.

pub mod reconciler;
pub mod render;
mod scheduler;
mod store;
mod types;

pub use scheduler::{CycleReport, PollScheduler, RefreshCycle};
pub use store::{CommitOutcome, FeedSnapshot, FeedStore, PrimaryTicket};
pub use types::{ActionCategory, ActionKind, Fingerprint, LogEntry, Timestamp, LEDGER_ACTOR};

use crate::backend::{ActivityRecord, BackendClient, PrimarySource};
use crate::config::{Config, FeedConfig};
use crate::errors::FeedResult;
use crate::ledger::{
    ConnectionGate, GateStatus, JsonRpcConnector, LiveSubscriber, SecondaryFetcher,
};
use crate::logger::{self, LogTag};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct AuditFeed {
    store: Arc<FeedStore>,
    primary: Arc<dyn PrimarySource>,
    gate: Arc<ConnectionGate>,
    cycle: Arc<RefreshCycle>,
    scheduler: PollScheduler,
    subscriber: Arc<LiveSubscriber>,
    live_updates: bool,
}

impl AuditFeed {
    pub fn new(
        primary: Arc<dyn PrimarySource>,
        gate: Arc<ConnectionGate>,
        config: &FeedConfig,
        scale: f64,
    ) -> Self {
        let store = Arc::new(FeedStore::new());
        let fetcher = Arc::new(SecondaryFetcher::new(gate.clone(), scale));
        let cycle = Arc::new(RefreshCycle::new(store.clone(), primary.clone(), fetcher));
        let scheduler =
            PollScheduler::new(cycle.clone(), Duration::from_millis(config.poll_interval_ms));
        let subscriber = Arc::new(LiveSubscriber::new(gate.clone(), scale));

        Self {
            store,
            primary,
            gate,
            cycle,
            scheduler,
            subscriber,
            live_updates: config.live_updates,
        }
    }

    /// Build the HTTP backend client and, when enabled, the ledger gate
    pub fn from_config(config: &Config) -> FeedResult<Self> {
        let primary: Arc<dyn PrimarySource> = Arc::new(BackendClient::new(&config.backend)?);

        let gate = if config.ledger.enabled {
            ConnectionGate::new(
                Arc::new(JsonRpcConnector::new(config.ledger.clone())),
                Duration::from_millis(config.ledger.connect_timeout_ms),
            )
        } else {
            logger::info(LogTag::Ledger, "Ledger disabled, running backend-only");
            ConnectionGate::disabled()
        };

        Ok(Self::new(primary, Arc::new(gate), &config.feed, config.ledger.scale_factor))
    }

    /// Start or stop the feed
    ///
    /// Activation clears the feed, runs a refresh immediately and starts the
    /// poll timer. Deactivation stops the timer, and results of requests
    /// still in flight are dropped. The ledger gate keeps its state either way.
    pub fn set_active(&self, active: bool) {
        if active {
            if self.store.activate().is_none() {
                return;
            }
            self.scheduler.start();
            if self.live_updates {
                self.attach_live_updates();
            }
            logger::info(LogTag::Feed, "Audit feed activated");
        } else {
            if !self.store.is_active() {
                return;
            }
            self.scheduler.stop();
            self.store.deactivate();
            logger::info(LogTag::Feed, "Audit feed deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    /// Run one refresh cycle now; `Inactive` when the feed is off
    pub async fn refresh(&self) -> CycleReport {
        self.cycle.run().await
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.store.snapshot()
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    pub fn live_attached(&self) -> bool {
        self.subscriber.is_attached()
    }

    /// Record a presentation-initiated activity, then refresh so it shows up
    pub async fn record_activity(
        &self,
        action: ActionKind,
        details: &str,
        actor: &str,
    ) -> FeedResult<()> {
        let record = ActivityRecord::new(action, details, actor);
        self.primary.log_activity(&record).await?;

        if self.store.is_active() {
            self.refresh().await;
        }
        Ok(())
    }

    /// Deactivate and drop the live subscription
    pub fn shutdown(&self) {
        self.set_active(false);
        self.subscriber.detach();
    }

    fn attach_live_updates(&self) {
        let subscriber = self.subscriber.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            subscriber
                .subscribe(move |entry| {
                    if store.prepend_live(entry) {
                        logger::debug(LogTag::Feed, "Live ledger event prepended");
                    }
                })
                .await;
        });
    }
}
