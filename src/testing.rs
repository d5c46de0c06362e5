//! In-process fakes for the backend and the ledger

use crate::backend::{ActivityRecord, PrimarySource};
use crate::errors::{FeedError, FeedResult};
use crate::feed::{ActionKind, LogEntry, Timestamp};
use crate::ledger::{LedgerConnector, LedgerRound, LedgerSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn upload(ts: i64) -> LogEntry {
    LogEntry::new(ActionKind::DataUpload, "CSV file uploaded", "Hospital A", Timestamp::new(ts))
}

/// Round `n` at timestamp `899 + n` with tx hash `0x{n + 9}` (round 1 is `0xa` at 900)
pub fn sample_round(n: u64) -> LedgerRound {
    LedgerRound {
        round_number: n,
        accuracy_scaled: 8_000 + n * 10,
        loss_scaled: Some(3_000),
        metadata_hash: None,
        timestamp: 899 + n as i64,
        tx_hash: Some(format!("0x{:x}", n + 9)),
    }
}

// =============================================================================
// PRIMARY
// =============================================================================

/// Backend serving scripted responses, then a fixed default list
pub struct FakePrimary {
    script: Mutex<VecDeque<(Duration, FeedResult<Vec<LogEntry>>)>>,
    fallback: Mutex<Vec<LogEntry>>,
    calls: AtomicUsize,
    activities: Mutex<Vec<ActivityRecord>>,
}

impl FakePrimary {
    pub fn new(default: Vec<LogEntry>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(default),
            calls: AtomicUsize::new(0),
            activities: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, delay: Duration, entries: Vec<LogEntry>) {
        self.script.lock().push_back((delay, Ok(entries)));
    }

    pub fn push_err(&self, delay: Duration, error: FeedError) {
        self.script.lock().push_back((delay, Err(error)));
    }

    pub fn set_default(&self, entries: Vec<LogEntry>) {
        *self.fallback.lock() = entries;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn activities(&self) -> Vec<ActivityRecord> {
        self.activities.lock().clone()
    }
}

#[async_trait]
impl PrimarySource for FakePrimary {
    async fn fetch_logs(&self) -> FeedResult<Vec<LogEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(self.fallback.lock().clone()),
        }
    }

    async fn log_activity(&self, record: &ActivityRecord) -> FeedResult<()> {
        self.activities.lock().push(record.clone());
        let mut entries = self.fallback.lock();
        let entry = LogEntry::new(
            record.action.clone(),
            record.details.clone(),
            record.actor.clone(),
            Timestamp::now(),
        );
        entries.insert(0, entry);
        Ok(())
    }
}

// =============================================================================
// LEDGER
// =============================================================================

pub struct FakeLedger {
    rounds: Mutex<Vec<LedgerRound>>,
    failing: Mutex<HashSet<u64>>,
    events: Mutex<Option<mpsc::Sender<LedgerRound>>>,
    subscribe_fails: AtomicBool,
    round_delay: Mutex<Duration>,
    round_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn with_rounds(count: u64) -> Self {
        Self {
            rounds: Mutex::new((1..=count).map(sample_round).collect()),
            failing: Mutex::new(HashSet::new()),
            events: Mutex::new(None),
            subscribe_fails: AtomicBool::new(false),
            round_delay: Mutex::new(Duration::ZERO),
            round_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_round(&self, round: LedgerRound) {
        self.rounds.lock().push(round);
    }

    pub fn fail_round(&self, number: u64) {
        self.failing.lock().insert(number);
    }

    /// Delay every per-round query by `delay`
    pub fn set_round_delay(&self, delay: Duration) {
        *self.round_delay.lock() = delay;
    }

    /// Make every later `subscribe_rounds` call fail
    pub fn fail_subscribe(&self) {
        self.subscribe_fails.store(true, Ordering::SeqCst);
    }

    pub fn round_calls(&self) -> usize {
        self.round_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Deliver a pushed round to the current subscriber, if any
    pub async fn push_event(&self, round: LedgerRound) {
        let sender = self.events.lock().clone();
        if let Some(sender) = sender {
            let _ = sender.send(round).await;
        }
    }
}

#[async_trait]
impl LedgerSource for FakeLedger {
    async fn round_count(&self) -> FeedResult<u64> {
        Ok(self.rounds.lock().len() as u64)
    }

    async fn round(&self, number: u64) -> FeedResult<LedgerRound> {
        self.round_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.round_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&number) {
            return Err(FeedError::Ledger(format!("round {} reverted", number)));
        }
        self.rounds
            .lock()
            .iter()
            .find(|round| round.round_number == number)
            .cloned()
            .ok_or_else(|| FeedError::Ledger(format!("round {} not found", number)))
    }

    async fn subscribe_rounds(&self) -> FeedResult<mpsc::Receiver<LedgerRound>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.subscribe_fails.load(Ordering::SeqCst) {
            return Err(FeedError::Network("websocket handshake rejected".to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock() = Some(tx);
        Ok(rx)
    }
}

pub enum ConnectBehavior {
    Succeed(Arc<FakeLedger>),
    Fail,
    /// Never completes; only the gate timeout ends it
    Hang,
}

pub struct FakeConnector {
    behavior: ConnectBehavior,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new(behavior: ConnectBehavior) -> Self {
        Self { behavior, attempts: AtomicUsize::new(0) }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerConnector for FakeConnector {
    async fn connect(&self) -> FeedResult<Arc<dyn LedgerSource>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ConnectBehavior::Succeed(ledger) => Ok(ledger.clone() as Arc<dyn LedgerSource>),
            ConnectBehavior::Fail => Err(FeedError::Network("connection refused".to_string())),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}
