/// Refresh cycle and the poll timer that repeats it
///
/// A cycle awaits the backend, commits the result, then hands the ledger
/// history fetch to its own task so it never holds up the next cycle.
use super::store::{CommitOutcome, FeedStore};
use crate::backend::PrimarySource;
use crate::ledger::{GateState, SecondaryFetcher};
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What one cycle did
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CommitOutcome,
    /// Ledger merge started by this cycle; resolves to the entries added
    pub secondary: Option<JoinHandle<usize>>,
}

impl CycleReport {
    fn inactive() -> Self {
        Self { outcome: CommitOutcome::Inactive, secondary: None }
    }
}

pub struct RefreshCycle {
    store: Arc<FeedStore>,
    primary: Arc<dyn PrimarySource>,
    secondary: Arc<SecondaryFetcher>,
    /// Activation epoch of the history fetch currently running, if any
    secondary_in_flight: Arc<Mutex<Option<u64>>>,
}

impl RefreshCycle {
    pub fn new(
        store: Arc<FeedStore>,
        primary: Arc<dyn PrimarySource>,
        secondary: Arc<SecondaryFetcher>,
    ) -> Self {
        Self { store, primary, secondary, secondary_in_flight: Arc::new(Mutex::new(None)) }
    }

    pub async fn run(&self) -> CycleReport {
        let Some(ticket) = self.store.begin_primary() else {
            return CycleReport::inactive();
        };

        let result = self.primary.fetch_logs().await;
        match &result {
            Err(e) if e.is_transient() => {
                logger::warning(LogTag::Backend, &format!("Audit log fetch failed, retrying next tick: {}", e))
            }
            Err(e) => logger::error(LogTag::Backend, &format!("Audit log fetch rejected: {}", e)),
            Ok(_) => {}
        }

        let outcome = self.store.commit_primary(ticket, result);
        logger::verbose(
            LogTag::Scheduler,
            &format!("Primary request #{} -> {:?}", ticket.request_id, outcome),
        );

        let secondary = match outcome {
            CommitOutcome::Applied | CommitOutcome::Unchanged | CommitOutcome::Failed => {
                self.spawn_secondary(ticket.epoch)
            }
            CommitOutcome::Stale | CommitOutcome::Inactive => None,
        };

        CycleReport { outcome, secondary }
    }

    fn spawn_secondary(&self, epoch: u64) -> Option<JoinHandle<usize>> {
        if self.secondary.gate().state() == GateState::Failed {
            return None;
        }
        // one history fetch per activation at a time; a fetch left over from an
        // earlier activation does not block this one
        {
            let mut in_flight = self.secondary_in_flight.lock();
            if *in_flight == Some(epoch) {
                return None;
            }
            *in_flight = Some(epoch);
        }

        let guard = InFlightGuard { slot: self.secondary_in_flight.clone(), epoch };
        let store = self.store.clone();
        let fetcher = self.secondary.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            let rounds = fetcher.fetch_history().await;
            if rounds.is_empty() {
                return 0;
            }

            let added = store.merge_secondary(epoch, &rounds);
            if added > 0 {
                logger::debug(LogTag::Feed, &format!("Merged {} ledger round(s)", added));
            }
            added
        }))
    }
}

struct InFlightGuard {
    slot: Arc<Mutex<Option<u64>>>,
    epoch: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if *slot == Some(self.epoch) {
            *slot = None;
        }
    }
}

/// Owns the single poll timer
pub struct PollScheduler {
    cycle: Arc<RefreshCycle>,
    period: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(cycle: Arc<RefreshCycle>, period: Duration) -> Self {
        Self { cycle, period, timer: Mutex::new(None) }
    }

    /// Run a cycle now and then every `period`; no-op while already running
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let cycle = self.cycle.clone();
        let period = self.period;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // first tick completes immediately
                ticker.tick().await;
                if cycle.run().await.outcome == CommitOutcome::Inactive {
                    break;
                }
            }
            logger::debug(LogTag::Scheduler, "Poll loop ended");
        }));

        logger::debug(
            LogTag::Scheduler,
            &format!("Polling every {}ms", self.period.as_millis()),
        );
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            logger::debug(LogTag::Scheduler, "Poll timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
