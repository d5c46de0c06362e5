//! Merge rules for the two feed sources
//!
//! The backend list is authoritative and replaces the feed verbatim. Ledger
//! rounds are only ever prepended, and only when their round number is not
//! already represented by a training-round entry.

use super::types::{Fingerprint, LogEntry};
use std::collections::HashSet;

/// Combine the current feed with an optional primary result and optional
/// secondary rounds
pub fn merge(
    current: &[LogEntry],
    primary: Option<Vec<LogEntry>>,
    secondary: Option<&[LogEntry]>,
) -> Vec<LogEntry> {
    let base = primary.unwrap_or_else(|| current.to_vec());

    match secondary {
        Some(incoming) => merge_rounds(&base, incoming).unwrap_or(base),
        None => base,
    }
}

/// Prepend rounds not yet represented in `current`
///
/// Returns `None` when nothing would change so callers can skip publishing.
pub fn merge_rounds(current: &[LogEntry], incoming: &[LogEntry]) -> Option<Vec<LogEntry>> {
    let mut seen = known_rounds(current);

    let fresh: Vec<LogEntry> = incoming
        .iter()
        .filter(|entry| match entry.round_identity() {
            // insert() is false for rounds already known or repeated in this batch
            Some(round) => seen.insert(round),
            None => false,
        })
        .cloned()
        .collect();

    if fresh.is_empty() {
        return None;
    }

    let mut merged = Vec::with_capacity(fresh.len() + current.len());
    merged.extend(fresh);
    merged.extend_from_slice(current);
    Some(merged)
}

/// Round numbers already carried by training-round entries
pub fn known_rounds(entries: &[LogEntry]) -> HashSet<u64> {
    entries
        .iter()
        .filter(|entry| entry.is_training_round())
        .filter_map(LogEntry::round_identity)
        .collect()
}

pub fn fingerprint(entries: &[LogEntry]) -> Fingerprint {
    Fingerprint::of(entries)
}

/// Whether committing `incoming` would change the feed
///
/// The fingerprint rules out most unchanged polls cheaply; a matching
/// fingerprint is confirmed with a full comparison.
pub fn primary_changed(current: &[LogEntry], incoming: &[LogEntry]) -> bool {
    if fingerprint(current) != fingerprint(incoming) {
        return true;
    }
    current != incoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{ActionKind, Timestamp, LEDGER_ACTOR};
    use serde_json::json;

    fn upload(ts: i64) -> LogEntry {
        LogEntry::new(ActionKind::DataUpload, "CSV file uploaded", "Hospital A", Timestamp::new(ts))
    }

    fn ledger_round(round: u64, ts: i64, tx: &str) -> LogEntry {
        LogEntry::new(
            ActionKind::TrainingRound,
            format!("Round {} recorded", round),
            LEDGER_ACTOR,
            Timestamp::new(ts),
        )
        .with_metadata(json!({ "round": round }))
        .with_tx_hash(tx)
    }

    fn backend_round(round: u64, ts: i64) -> LogEntry {
        LogEntry::new(ActionKind::TrainingRound, "Training round completed", "FL Server", Timestamp::new(ts))
            .with_metadata(json!({ "round": round, "accuracy": 0.87, "model_hash": "abc" }))
    }

    #[test]
    fn test_primary_replaces_current_verbatim() {
        let current = vec![ledger_round(7, 50, "0x7"), upload(10)];
        let primary = vec![upload(30), upload(20)];

        let merged = merge(&current, Some(primary.clone()), None);
        assert_eq!(merged, primary);
    }

    #[test]
    fn test_secondary_prepended_in_source_order() {
        let current = vec![upload(1000)];
        let rounds = vec![ledger_round(2, 950, "0xb"), ledger_round(1, 900, "0xa")];

        let merged = merge(&current, None, Some(&rounds));
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].round_identity(), Some(2));
        assert_eq!(merged[1].round_identity(), Some(1));
        assert_eq!(merged[2], upload(1000));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let current = vec![upload(1000)];
        let rounds = vec![ledger_round(2, 950, "0xb"), ledger_round(1, 900, "0xa")];

        let once = merge(&current, None, Some(&rounds));
        let twice = merge(&once, None, Some(&rounds));
        assert_eq!(once, twice);
        assert!(merge_rounds(&once, &rounds).is_none());
    }

    #[test]
    fn test_backend_reported_round_not_duplicated() {
        let current = vec![backend_round(3, 500), upload(400)];
        let rounds = vec![ledger_round(3, 510, "0xc")];

        let merged = merge(&current, None, Some(&rounds));
        assert_eq!(merged, current);
    }

    #[test]
    fn test_only_training_rounds_count_as_known() {
        // A non-training entry carrying a round number does not block the ledger round
        let current =
            vec![LogEntry::new(ActionKind::TrainingStarted, "", "FL Server", Timestamp::new(5)).with_round(4)];
        let rounds = vec![ledger_round(4, 6, "0xd")];

        let merged = merge(&current, None, Some(&rounds));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].tx_hash.as_deref(), Some("0xd"));
    }

    #[test]
    fn test_batch_duplicates_and_identityless_entries_dropped() {
        let no_identity = LogEntry::new(ActionKind::TrainingRound, "", LEDGER_ACTOR, Timestamp::new(1));
        let rounds = vec![ledger_round(1, 10, "0xa"), ledger_round(1, 11, "0xa2"), no_identity];

        let merged = merge(&[], None, Some(&rounds));
        assert_eq!(merged, vec![ledger_round(1, 10, "0xa")]);
    }

    #[test]
    fn test_primary_then_secondary_in_one_merge() {
        let stale = vec![ledger_round(9, 99, "0x9")];
        let primary = vec![upload(1000)];
        let rounds = vec![ledger_round(1, 900, "0xa")];

        let merged = merge(&stale, Some(primary), Some(&rounds));
        assert_eq!(merged, vec![ledger_round(1, 900, "0xa"), upload(1000)]);
    }

    #[test]
    fn test_primary_changed_confirms_matching_fingerprint() {
        let current = vec![upload(1000).with_tx_hash("0x1"), upload(900)];

        // same length, same head hash, different tail
        let mut edited = current.clone();
        edited[1].details = "CSV file re-uploaded".to_string();
        assert_eq!(fingerprint(&current), fingerprint(&edited));
        assert!(primary_changed(&current, &edited));

        assert!(!primary_changed(&current, &current.clone()));
        assert!(primary_changed(&current, &current[..1]));
        assert!(primary_changed(&[], &current));
    }
}
