//! Feed data model: `LogEntry`, its action categories and timestamps
//!
//! Wire format follows the backend's audit log records. Both `camelCase` and
//! `snake_case` spellings of `recordCount` / `txHash` are accepted; output
//! uses `camelCase`.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actor recorded on entries that originate from the ledger
pub const LEDGER_ACTOR: &str = "Blockchain";

/// Raw values at or above this are epoch milliseconds, below are epoch seconds
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Instant as received on the wire, in either epoch seconds or milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimestamp")]
pub struct Timestamp(i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TryFrom<RawTimestamp> for Timestamp {
    type Error = String;

    fn try_from(raw: RawTimestamp) -> Result<Self, Self::Error> {
        match raw {
            RawTimestamp::Int(value) => Ok(Timestamp(value)),
            RawTimestamp::Float(value) => Timestamp::from_float(value),
            RawTimestamp::Text(text) => {
                let text = text.trim();
                if let Ok(value) = text.parse::<i64>() {
                    return Ok(Timestamp(value));
                }
                if let Ok(value) = text.parse::<f64>() {
                    return Timestamp::from_float(value);
                }
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| Timestamp(dt.timestamp_millis()))
                    .map_err(|e| format!("unrecognized timestamp '{}': {}", text, e))
            }
        }
    }
}

impl Timestamp {
    /// Wrap a raw value; the unit is inferred on use
    pub fn new(raw: i64) -> Self {
        Timestamp(raw)
    }

    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs)
    }

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_millis())
    }

    // Fractional seconds keep their sub-second part by switching to millis.
    fn from_float(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("non-finite timestamp {}", value));
        }
        if value.fract() != 0.0 && value.abs() < MILLIS_THRESHOLD as f64 {
            Ok(Timestamp((value * 1000.0).round() as i64))
        } else {
            Ok(Timestamp(value.round() as i64))
        }
    }

    /// Value exactly as received
    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn is_millis(&self) -> bool {
        self.0.abs() >= MILLIS_THRESHOLD
    }

    /// Normalized epoch milliseconds
    pub fn as_millis(&self) -> i64 {
        if self.is_millis() {
            self.0
        } else {
            self.0.saturating_mul(1000)
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.as_millis()).single()
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// What an audit entry records. Unknown wire names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    DataUpload,
    UserLogin,
    LoginFailed,
    TrainingRound,
    TrainingStarted,
    DashboardViewed,
    PatientsViewed,
    TrialsViewed,
    Navigation,
    EligibilityScreen,
    EligibilityPrediction,
    SystemStartup,
    Other(String),
}

/// Coarse grouping used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Upload,
    Login,
    Training,
    Navigation,
    Screening,
    System,
    Other,
}

impl ActionKind {
    /// Parse a wire name; case, dashes and spaces are normalized
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "DATA_UPLOAD" | "UPLOAD" => ActionKind::DataUpload,
            "USER_LOGIN" | "LOGIN" => ActionKind::UserLogin,
            "LOGIN_FAILED" => ActionKind::LoginFailed,
            "TRAINING_ROUND" => ActionKind::TrainingRound,
            "TRAINING_STARTED" => ActionKind::TrainingStarted,
            "DASHBOARD_VIEWED" => ActionKind::DashboardViewed,
            "PATIENTS_VIEWED" => ActionKind::PatientsViewed,
            "TRIALS_VIEWED" => ActionKind::TrialsViewed,
            "NAVIGATION" | "PAGE_VIEW" => ActionKind::Navigation,
            "ELIGIBILITY_SCREEN" => ActionKind::EligibilityScreen,
            "ELIGIBILITY_PREDICTION" => ActionKind::EligibilityPrediction,
            "SYSTEM_STARTUP" => ActionKind::SystemStartup,
            _ => ActionKind::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::DataUpload => "DATA_UPLOAD",
            ActionKind::UserLogin => "USER_LOGIN",
            ActionKind::LoginFailed => "LOGIN_FAILED",
            ActionKind::TrainingRound => "TRAINING_ROUND",
            ActionKind::TrainingStarted => "TRAINING_STARTED",
            ActionKind::DashboardViewed => "DASHBOARD_VIEWED",
            ActionKind::PatientsViewed => "PATIENTS_VIEWED",
            ActionKind::TrialsViewed => "TRIALS_VIEWED",
            ActionKind::Navigation => "NAVIGATION",
            ActionKind::EligibilityScreen => "ELIGIBILITY_SCREEN",
            ActionKind::EligibilityPrediction => "ELIGIBILITY_PREDICTION",
            ActionKind::SystemStartup => "SYSTEM_STARTUP",
            ActionKind::Other(name) => name,
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            ActionKind::DataUpload => ActionCategory::Upload,
            ActionKind::UserLogin | ActionKind::LoginFailed => ActionCategory::Login,
            ActionKind::TrainingRound | ActionKind::TrainingStarted => ActionCategory::Training,
            ActionKind::DashboardViewed
            | ActionKind::PatientsViewed
            | ActionKind::TrialsViewed
            | ActionKind::Navigation => ActionCategory::Navigation,
            ActionKind::EligibilityScreen | ActionKind::EligibilityPrediction => {
                ActionCategory::Screening
            }
            ActionKind::SystemStartup => ActionCategory::System,
            ActionKind::Other(_) => ActionCategory::Other,
        }
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        ActionKind::parse(&name)
    }
}

impl From<ActionKind> for String {
    fn from(action: ActionKind) -> String {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// One audit feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub action: ActionKind,

    #[serde(default)]
    pub details: String,

    #[serde(default)]
    pub actor: String,

    #[serde(default, alias = "record_count", skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,

    pub timestamp: Timestamp,

    #[serde(default, alias = "tx_hash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    /// Opaque payload, carried through unmodified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Embedded round number, fallback when metadata carries none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u64>,
}

impl LogEntry {
    pub fn new(
        action: ActionKind,
        details: impl Into<String>,
        actor: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            action,
            details: details.into(),
            actor: actor.into(),
            record_count: None,
            timestamp,
            tx_hash: None,
            metadata: None,
            round: None,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_record_count(mut self, count: i64) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_round(mut self, round: u64) -> Self {
        self.round = Some(round);
        self
    }

    pub fn is_training_round(&self) -> bool {
        self.action == ActionKind::TrainingRound
    }

    /// Ledger round number: `metadata.round`, then `metadata.round_number`,
    /// then the embedded `round` field
    pub fn round_identity(&self) -> Option<u64> {
        self.metadata
            .as_ref()
            .and_then(|meta| {
                meta.get("round")
                    .and_then(value_as_round)
                    .or_else(|| meta.get("round_number").and_then(value_as_round))
            })
            .or(self.round)
    }

    /// Cheap identity: the transaction hash when present, else action@millis
    pub fn identity_key(&self) -> String {
        match &self.tx_hash {
            Some(hash) if !hash.is_empty() => hash.clone(),
            _ => format!("{}@{}", self.action.as_str(), self.timestamp.as_millis()),
        }
    }

    /// Local time for display, `-` when the timestamp is out of range
    pub fn display_time(&self) -> String {
        self.timestamp
            .to_datetime()
            .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

fn value_as_round(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// FINGERPRINT
// =============================================================================

/// Length plus identity of the newest entry; a cheap change detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    len: usize,
    head: Option<String>,
}

impl Fingerprint {
    pub fn of(entries: &[LogEntry]) -> Self {
        Self {
            len: entries.len(),
            head: entries.first().map(LogEntry::identity_key),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
