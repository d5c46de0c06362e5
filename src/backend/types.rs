use crate::feed::{ActionKind, LogEntry};
use crate::logger::{self, LogTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the audit log query
///
/// Current backends wrap the list as `{ "logs": [...], "total": n }`; older
/// ones return the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LogsPayload {
    Envelope {
        logs: Vec<Value>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<Value>),
}

impl LogsPayload {
    /// Total reported by the backend, which may exceed the returned page
    pub fn total(&self) -> Option<u64> {
        match self {
            LogsPayload::Envelope { total, .. } => *total,
            LogsPayload::Bare(_) => None,
        }
    }

    /// Decode records in backend order, skipping any that do not parse
    pub fn into_entries(self) -> Vec<LogEntry> {
        let raw = match self {
            LogsPayload::Envelope { logs, .. } => logs,
            LogsPayload::Bare(logs) => logs,
        };

        let mut skipped = 0usize;
        let entries: Vec<LogEntry> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<LogEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    skipped += 1;
                    logger::debug(LogTag::Backend, &format!("Skipping malformed log record: {}", e));
                    None
                }
            })
            .collect();

        if skipped > 0 {
            logger::warning(
                LogTag::Backend,
                &format!("Skipped {} malformed audit log record(s)", skipped),
            );
        }
        entries
    }
}

/// Presentation-initiated activity posted to the backend audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub action: ActionKind,
    pub details: String,
    pub actor: String,
}

impl ActivityRecord {
    pub fn new(action: ActionKind, details: impl Into<String>, actor: impl Into<String>) -> Self {
        let actor = actor.into();
        Self {
            action,
            details: details.into(),
            actor: if actor.is_empty() { "System".to_string() } else { actor },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_payload() {
        let payload: LogsPayload = serde_json::from_value(json!({
            "logs": [
                { "action": "TRAINING_ROUND", "details": "Round 2", "actor": "FL Server",
                  "timestamp": 1_700_000_200, "txHash": "0x2",
                  "metadata": { "round": 2, "accuracy": 0.91, "model_hash": "ab12" } },
                { "action": "DATA_UPLOAD", "details": "CSV", "actor": "Hospital A",
                  "record_count": 50, "timestamp": 1_700_000_100 }
            ],
            "total": 2
        }))
        .unwrap();

        assert_eq!(payload.total(), Some(2));
        let entries = payload.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].round_identity(), Some(2));
        assert_eq!(entries[1].record_count, Some(50));
    }

    #[test]
    fn test_bare_array_payload() {
        let payload: LogsPayload = serde_json::from_value(json!([
            { "action": "USER_LOGIN", "actor": "dr.lee", "timestamp": 1_700_000_000_000i64 }
        ]))
        .unwrap();

        assert_eq!(payload.total(), None);
        let entries = payload.into_entries();
        assert_eq!(entries[0].action, ActionKind::UserLogin);
        assert!(entries[0].timestamp.is_millis());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let payload: LogsPayload = serde_json::from_value(json!({
            "logs": [
                { "action": "DATA_UPLOAD", "timestamp": 5 },
                { "details": "no action or timestamp" },
                { "action": "LOGIN_FAILED", "timestamp": "not a time" }
            ]
        }))
        .unwrap();

        let entries = payload.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActionKind::DataUpload);
    }

    #[test]
    fn test_activity_record_wire_shape() {
        let record = ActivityRecord::new(ActionKind::PatientsViewed, "Opened patient list", "");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            json!({ "action": "PATIENTS_VIEWED", "details": "Opened patient list", "actor": "System" })
        );
    }
}
