use super::gate::ConnectionGate;
use crate::feed::LogEntry;
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Standing subscription to newly recorded ledger rounds
///
/// Attaches at most once. Failures are logged and otherwise swallowed; the
/// feed simply keeps running on polling alone.
pub struct LiveSubscriber {
    gate: Arc<ConnectionGate>,
    scale: f64,
    attached: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSubscriber {
    pub fn new(gate: Arc<ConnectionGate>, scale: f64) -> Self {
        Self { gate, scale, attached: AtomicBool::new(false), pump: Mutex::new(None) }
    }

    /// Attach `on_event` to the ledger's round stream
    ///
    /// Returns true only for the call that actually attached.
    pub async fn subscribe<F>(&self, on_event: F) -> bool
    where
        F: Fn(LogEntry) + Send + Sync + 'static,
    {
        if self.attached.swap(true, Ordering::SeqCst) {
            return false;
        }

        let Some(source) = self.gate.connect().await else {
            logger::debug(LogTag::Subscriber, "Live updates unavailable: ledger not connected");
            return false;
        };

        let mut rounds = match source.subscribe_rounds().await {
            Ok(rx) => rx,
            Err(e) => {
                logger::warning(LogTag::Subscriber, &format!("Live updates unavailable: {}", e));
                return false;
            }
        };

        let scale = self.scale;
        let handle = tokio::spawn(async move {
            while let Some(round) = rounds.recv().await {
                logger::debug(
                    LogTag::Subscriber,
                    &format!("Round {} confirmed on ledger", round.round_number),
                );
                on_event(round.to_log_entry(scale));
            }
            logger::debug(LogTag::Subscriber, "Ledger event stream closed");
        });

        *self.pump.lock() = Some(handle);
        logger::info(LogTag::Subscriber, "Live ledger updates attached");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.pump.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop delivering events; the subscription is not re-established
    pub fn detach(&self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for LiveSubscriber {
    fn drop(&mut self) {
        self.detach();
    }
}
