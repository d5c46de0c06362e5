//! Observable feed state
//!
//! The store is the only mutable state shared between the scheduler, the
//! ledger fetch task and the live subscriber. Every mutation builds a new
//! entry vector under the lock and publishes it whole through a `watch`
//! channel, so observers never see a partially merged list.

use super::reconciler;
use super::types::LogEntry;
use crate::errors::FeedResult;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// What presentation code observes
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub entries: Arc<Vec<LogEntry>>,
    pub loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeedSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Issued to each primary fetch; results are matched back against it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryTicket {
    pub epoch: u64,
    pub request_id: u64,
}

/// Result of committing a primary fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Entries replaced
    Applied,
    /// Backend returned the same list as the last commit
    Unchanged,
    /// Fetch failed; entries kept, error flag set
    Failed,
    /// A newer request already resolved
    Stale,
    /// Feed deactivated since the request was issued
    Inactive,
}

#[derive(Debug, Default)]
struct StoreState {
    active: bool,
    epoch: u64,
    next_request_id: u64,
    newest_issued: u64,
    newest_resolved: u64,
    /// Last backend list committed this activation, for change detection
    last_primary: Option<Arc<Vec<LogEntry>>>,
    snapshot: FeedSnapshot,
}

pub struct FeedStore {
    state: Mutex<StoreState>,
    tx: watch::Sender<FeedSnapshot>,
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedSnapshot::default());
        Self { state: Mutex::new(StoreState::default()), tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.lock().snapshot.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Current activation epoch, `None` while inactive
    pub fn current_epoch(&self) -> Option<u64> {
        let state = self.state.lock();
        state.active.then_some(state.epoch)
    }

    /// Start a new activation with an empty feed
    ///
    /// Returns the new epoch, or `None` if the store was already active.
    pub fn activate(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.active {
            return None;
        }
        state.active = true;
        state.epoch += 1;
        state.newest_issued = state.next_request_id;
        state.newest_resolved = state.next_request_id;
        state.last_primary = None;
        state.snapshot = FeedSnapshot::default();
        self.publish(&state);

        logger::debug(LogTag::Feed, &format!("Feed activated (epoch {})", state.epoch));
        Some(state.epoch)
    }

    /// End the activation; results of requests issued before this are discarded
    pub fn deactivate(&self) {
        let mut state = self.state.lock();
        if !state.active {
            return;
        }
        state.active = false;
        // in-flight work tagged with the old epoch no longer matches
        state.epoch += 1;
        logger::debug(LogTag::Feed, "Feed deactivated");
    }

    /// Register a primary fetch about to be issued
    pub fn begin_primary(&self) -> Option<PrimaryTicket> {
        let mut state = self.state.lock();
        if !state.active {
            return None;
        }
        state.next_request_id += 1;
        state.newest_issued = state.next_request_id;

        let loading_changed = !state.snapshot.loading;
        state.snapshot.loading = true;
        if loading_changed {
            self.publish(&state);
        }

        Some(PrimaryTicket { epoch: state.epoch, request_id: state.next_request_id })
    }

    /// Apply a primary fetch result if it is still the newest for this activation
    pub fn commit_primary(
        &self,
        ticket: PrimaryTicket,
        result: FeedResult<Vec<LogEntry>>,
    ) -> CommitOutcome {
        let mut state = self.state.lock();
        if !state.active || state.epoch != ticket.epoch {
            return CommitOutcome::Inactive;
        }
        if ticket.request_id <= state.newest_resolved {
            logger::debug(
                LogTag::Feed,
                &format!(
                    "Discarding stale primary result #{} (newest resolved #{})",
                    ticket.request_id, state.newest_resolved
                ),
            );
            return CommitOutcome::Stale;
        }
        state.newest_resolved = ticket.request_id;

        let loading = ticket.request_id < state.newest_issued;

        match result {
            Ok(entries) => {
                let changed = match &state.last_primary {
                    Some(last) => reconciler::primary_changed(last, &entries),
                    None => true,
                };
                if changed {
                    let entries =
                        Arc::new(reconciler::merge(&state.snapshot.entries, Some(entries), None));
                    state.last_primary = Some(entries.clone());
                    state.snapshot.entries = entries;
                    state.snapshot.loading = loading;
                    state.snapshot.error = None;
                    state.snapshot.updated_at = Some(Utc::now());
                    self.publish(&state);
                    CommitOutcome::Applied
                } else {
                    let flags_changed =
                        state.snapshot.loading != loading || state.snapshot.error.is_some();
                    state.snapshot.loading = loading;
                    state.snapshot.error = None;
                    if flags_changed {
                        self.publish(&state);
                    }
                    CommitOutcome::Unchanged
                }
            }
            Err(e) => {
                state.snapshot.loading = loading;
                state.snapshot.error = Some(e.to_string());
                self.publish(&state);
                CommitOutcome::Failed
            }
        }
    }

    /// Merge ledger history fetched during `epoch`; returns entries added
    pub fn merge_secondary(&self, epoch: u64, rounds: &[LogEntry]) -> usize {
        let mut state = self.state.lock();
        if !state.active || state.epoch != epoch {
            return 0;
        }
        self.apply_rounds(&mut state, rounds)
    }

    /// Prepend one live event to the active feed
    pub fn prepend_live(&self, entry: LogEntry) -> bool {
        let mut state = self.state.lock();
        if !state.active {
            return false;
        }
        self.apply_rounds(&mut state, std::slice::from_ref(&entry)) > 0
    }

    fn apply_rounds(&self, state: &mut StoreState, rounds: &[LogEntry]) -> usize {
        let before = state.snapshot.entries.len();
        let merged = reconciler::merge(&state.snapshot.entries, None, Some(rounds));
        // merging only ever prepends, so an unchanged length means nothing new
        let added = merged.len() - before;
        if added == 0 {
            return 0;
        }

        state.snapshot.entries = Arc::new(merged);
        state.snapshot.updated_at = Some(Utc::now());
        self.publish(state);
        added
    }

    fn publish(&self, state: &StoreState) {
        self.tx.send_replace(state.snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FeedError;
    use crate::feed::types::{ActionKind, Timestamp, LEDGER_ACTOR};
    use serde_json::json;

    fn upload(ts: i64) -> LogEntry {
        LogEntry::new(ActionKind::DataUpload, "CSV file uploaded", "Hospital A", Timestamp::new(ts))
    }

    fn round(n: u64) -> LogEntry {
        LogEntry::new(ActionKind::TrainingRound, "", LEDGER_ACTOR, Timestamp::new(n as i64))
            .with_metadata(json!({ "round": n }))
    }

    #[test]
    fn test_inactive_store_ignores_everything() {
        let store = FeedStore::new();
        assert!(store.begin_primary().is_none());
        assert_eq!(store.merge_secondary(0, &[round(1)]), 0);
        assert!(!store.prepend_live(round(1)));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_activate_is_idempotent_and_resets_feed() {
        let store = FeedStore::new();
        let epoch = store.activate().unwrap();
        assert!(store.activate().is_none());
        assert!(store.prepend_live(round(1)));

        store.deactivate();
        let next = store.activate().unwrap();
        assert!(next > epoch);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_failure_keeps_entries_and_sets_error() {
        let store = FeedStore::new();
        store.activate();

        let ticket = store.begin_primary().unwrap();
        assert!(store.snapshot().loading);
        assert_eq!(store.commit_primary(ticket, Ok(vec![upload(1000)])), CommitOutcome::Applied);
        assert!(!store.snapshot().loading);

        let ticket = store.begin_primary().unwrap();
        let outcome = store.commit_primary(ticket, Err(FeedError::Network("refused".into())));
        assert_eq!(outcome, CommitOutcome::Failed);

        let snap = store.snapshot();
        assert_eq!(snap.entries.as_slice(), &[upload(1000)]);
        assert!(snap.error.as_deref().unwrap_or_default().contains("refused"));

        // next success clears the error even when entries are unchanged
        let ticket = store.begin_primary().unwrap();
        assert_eq!(store.commit_primary(ticket, Ok(vec![upload(1000)])), CommitOutcome::Unchanged);
        assert!(store.snapshot().error.is_none());
    }

    #[test]
    fn test_older_request_resolving_late_is_stale() {
        let store = FeedStore::new();
        store.activate();

        let a = store.begin_primary().unwrap();
        let b = store.begin_primary().unwrap();

        assert_eq!(store.commit_primary(b, Ok(vec![upload(2)])), CommitOutcome::Applied);
        assert_eq!(store.commit_primary(a, Ok(vec![upload(1)])), CommitOutcome::Stale);
        assert_eq!(store.snapshot().entries.as_slice(), &[upload(2)]);
    }

    #[test]
    fn test_loading_stays_set_while_newer_request_pending() {
        let store = FeedStore::new();
        store.activate();

        let a = store.begin_primary().unwrap();
        let b = store.begin_primary().unwrap();
        store.commit_primary(a, Ok(vec![upload(1)]));
        assert!(store.snapshot().loading);
        store.commit_primary(b, Ok(vec![upload(2)]));
        assert!(!store.snapshot().loading);
    }

    #[test]
    fn test_results_from_previous_activation_discarded() {
        let store = FeedStore::new();
        let epoch = store.activate().unwrap();
        let ticket = store.begin_primary().unwrap();

        store.deactivate();
        store.activate();

        assert_eq!(store.commit_primary(ticket, Ok(vec![upload(1)])), CommitOutcome::Inactive);
        assert_eq!(store.merge_secondary(epoch, &[round(1)]), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_merge_secondary_counts_additions() {
        let store = FeedStore::new();
        let epoch = store.activate().unwrap();

        assert_eq!(store.merge_secondary(epoch, &[round(2), round(1)]), 2);
        assert_eq!(store.merge_secondary(epoch, &[round(3), round(2)]), 1);
        assert!(!store.prepend_live(round(3)));

        let rounds: Vec<_> = store.snapshot().entries.iter().filter_map(|e| e.round_identity()).collect();
        assert_eq!(rounds, vec![3, 2, 1]);
    }

    #[test]
    fn test_store_follows_reconciler_merge() {
        let store = FeedStore::new();
        let epoch = store.activate().unwrap();
        let backend = vec![upload(2000), upload(1000)];
        let ledger = vec![round(2), round(1)];

        let ticket = store.begin_primary().unwrap();
        store.commit_primary(ticket, Ok(backend.clone()));
        store.merge_secondary(epoch, &ledger);
        store.prepend_live(round(3));

        let expected = reconciler::merge(&[], Some(backend), Some(&ledger));
        let expected = reconciler::merge(&expected, None, Some(&[round(3)]));
        assert_eq!(store.snapshot().entries.as_slice(), expected.as_slice());
        assert_eq!(store.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn test_subscribers_see_whole_snapshots() {
        let store = FeedStore::new();
        let mut rx = store.subscribe();
        let epoch = store.activate().unwrap();
        rx.borrow_and_update();

        store.merge_secondary(epoch, &[round(2), round(1)]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);

        // no-op merge publishes nothing
        store.merge_secondary(epoch, &[round(1)]);
        assert!(!rx.has_changed().unwrap());
    }
}
