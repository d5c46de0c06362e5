/// Ledger round records and their conversion into feed entries
use crate::errors::{FeedError, FeedResult};
use crate::feed::{ActionKind, LogEntry, Timestamp, LEDGER_ACTOR};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// One training round as recorded on the ledger
///
/// Accuracy and loss are stored as integers scaled by the ledger's fixed
/// factor; `accuracy()` / `loss()` recover the fractional values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRound {
    #[serde(alias = "roundNumber", alias = "round", deserialize_with = "flex_u64")]
    pub round_number: u64,

    #[serde(alias = "accuracy", deserialize_with = "flex_u64")]
    pub accuracy_scaled: u64,

    #[serde(default, alias = "loss", deserialize_with = "flex_u64_opt")]
    pub loss_scaled: Option<u64>,

    #[serde(default, alias = "metadataHash", alias = "modelHash")]
    pub metadata_hash: Option<String>,

    #[serde(deserialize_with = "flex_i64")]
    pub timestamp: i64,

    #[serde(default, alias = "txHash", alias = "transactionHash")]
    pub tx_hash: Option<String>,
}

impl LedgerRound {
    /// Decode a round from either an object or the positional contract tuple
    /// `[round_number, accuracy, loss, timestamp]`
    ///
    /// Older contracts put the metadata hash in the third slot, so a string
    /// there is read as the hash rather than the loss.
    pub fn from_value(value: Value) -> FeedResult<Self> {
        let value = match value {
            Value::Array(items) => {
                let mut items = items.into_iter();
                let mut next = || items.next().unwrap_or(Value::Null);
                let round_number = next();
                let accuracy = next();
                let third = next();
                let timestamp = next();

                let third_is_hash = third.is_string() && parse_flex_u64(&third).is_none();
                let (loss, hash) = if third_is_hash {
                    (Value::Null, third)
                } else {
                    (third, Value::Null)
                };

                json!({
                    "round_number": round_number,
                    "accuracy_scaled": accuracy,
                    "loss_scaled": loss,
                    "metadata_hash": hash,
                    "timestamp": timestamp,
                })
            }
            other => other,
        };

        serde_json::from_value(value)
            .map_err(|e| FeedError::InvalidResponse(format!("ledger round: {}", e)))
    }

    pub fn accuracy(&self, scale: f64) -> f64 {
        descale(self.accuracy_scaled, scale)
    }

    pub fn loss(&self, scale: f64) -> Option<f64> {
        self.loss_scaled.map(|v| descale(v, scale))
    }

    /// Feed entry for this round, attributed to the ledger
    pub fn to_log_entry(&self, scale: f64) -> LogEntry {
        let accuracy = self.accuracy(scale);

        let mut metadata = json!({
            "round": self.round_number,
            "accuracy": accuracy,
        });
        if let Some(loss) = self.loss(scale) {
            metadata["loss"] = json!(loss);
        }
        if let Some(hash) = &self.metadata_hash {
            metadata["metadata_hash"] = json!(hash);
        }

        let mut entry = LogEntry::new(
            ActionKind::TrainingRound,
            format!(
                "Round {} recorded on ledger (accuracy {:.2}%)",
                self.round_number,
                accuracy * 100.0
            ),
            LEDGER_ACTOR,
            Timestamp::new(self.timestamp),
        )
        .with_metadata(metadata)
        .with_record_count(1);

        if let Some(tx) = &self.tx_hash {
            entry = entry.with_tx_hash(tx.clone());
        }
        entry
    }

    /// Recompute the metadata hash from the model hash and compare with the
    /// stored value
    pub fn verify_hash(&self, model_hash: &str) -> bool {
        match &self.metadata_hash {
            Some(stored) => {
                let computed = compute_metadata_hash(
                    self.round_number,
                    self.accuracy_scaled,
                    model_hash,
                    self.timestamp,
                );
                stored.trim_start_matches("0x").eq_ignore_ascii_case(&computed)
            }
            None => false,
        }
    }
}

/// SHA-256 hex of the canonical (sorted keys, compact, ASCII-only) JSON of a
/// round's metadata
pub fn compute_metadata_hash(
    round_number: u64,
    accuracy_scaled: u64,
    model_hash: &str,
    timestamp: i64,
) -> String {
    let canonical = format!(
        "{{\"accuracy_scaled\":{},\"model_hash\":{},\"round_number\":{},\"timestamp\":{}}}",
        accuracy_scaled,
        ascii_json_string(model_hash),
        round_number,
        timestamp
    );

    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

/// JSON string literal with every non-ASCII character written as `\uXXXX`
/// (UTF-16 surrogate pairs above the BMP)
fn ascii_json_string(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    let mut out = String::with_capacity(quoted.len());
    for ch in quoted.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

pub fn descale(value: u64, scale: f64) -> f64 {
    if scale > 0.0 {
        value as f64 / scale
    } else {
        value as f64
    }
}

/// Unsigned integer from a JSON number, decimal string or `0x` hex string
pub fn parse_flex_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

fn flex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_flex_u64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {}", value)))
}

fn flex_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    parse_flex_u64(&value)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {}", value)))
}

fn flex_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value
        .as_i64()
        .or_else(|| parse_flex_u64(&value).and_then(|v| i64::try_from(v).ok()))
        .ok_or_else(|| serde::de::Error::custom(format!("expected timestamp, got {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(n: u64) -> LedgerRound {
        LedgerRound {
            round_number: n,
            accuracy_scaled: 8734,
            loss_scaled: Some(3120),
            metadata_hash: None,
            timestamp: 1_700_000_000,
            tx_hash: Some("0xfeed".to_string()),
        }
    }

    #[test]
    fn test_descaling() {
        let r = round(1);
        assert!((r.accuracy(10_000.0) - 0.8734).abs() < 1e-9);
        assert!((r.loss(10_000.0).unwrap() - 0.312).abs() < 1e-9);
        assert_eq!(descale(5, 0.0), 5.0);
    }

    #[test]
    fn test_to_log_entry() {
        let entry = round(4).to_log_entry(10_000.0);
        assert_eq!(entry.action, ActionKind::TrainingRound);
        assert_eq!(entry.actor, LEDGER_ACTOR);
        assert_eq!(entry.round_identity(), Some(4));
        assert_eq!(entry.tx_hash.as_deref(), Some("0xfeed"));
        assert_eq!(entry.timestamp.raw(), 1_700_000_000);
        assert_eq!(entry.record_count, Some(1));
        assert!(entry.details.contains("87.34%"));
    }

    #[test]
    fn test_decode_object_and_tuple_forms() {
        let object = LedgerRound::from_value(json!({
            "roundNumber": "0x2",
            "accuracy": 9100,
            "modelHash": "ab",
            "timestamp": "1700000000",
            "txHash": "0x1"
        }))
        .unwrap();
        assert_eq!(object.round_number, 2);
        assert_eq!(object.accuracy_scaled, 9100);
        assert_eq!(object.metadata_hash.as_deref(), Some("ab"));
        assert_eq!(object.loss_scaled, None);

        let tuple = LedgerRound::from_value(json!([3, 8800, "cd", 1_700_000_100])).unwrap();
        assert_eq!(tuple.round_number, 3);
        assert_eq!(tuple.metadata_hash.as_deref(), Some("cd"));
        assert_eq!(tuple.loss_scaled, None);
        assert_eq!(tuple.timestamp, 1_700_000_100);
        assert_eq!(tuple.tx_hash, None);

        assert!(LedgerRound::from_value(json!({ "round": "x" })).is_err());
    }

    #[test]
    fn test_decode_tuple_with_loss() {
        let r = LedgerRound::from_value(json!([3, 8734, 3120, 1_700_000_000])).unwrap();
        assert_eq!(r.round_number, 3);
        assert_eq!(r.accuracy_scaled, 8734);
        assert_eq!(r.loss_scaled, Some(3120));
        assert_eq!(r.metadata_hash, None);
        assert_eq!(r.timestamp, 1_700_000_000);
        assert!((r.loss(10_000.0).unwrap() - 0.312).abs() < 1e-9);

        let hex_loss = LedgerRound::from_value(json!(["0x4", "8734", "0xc30", 1_700_000_000])).unwrap();
        assert_eq!(hex_loss.round_number, 4);
        assert_eq!(hex_loss.loss_scaled, Some(3120));
        assert_eq!(hex_loss.metadata_hash, None);
    }

    #[test]
    fn test_metadata_hash_escapes_non_ascii() {
        assert_eq!(ascii_json_string("model-abc"), r#""model-abc""#);
        assert_eq!(ascii_json_string("modèle"), r#""mod\u00e8le""#);
        assert_eq!(ascii_json_string("a😀"), r#""a\ud83d\ude00""#);
        assert_eq!(ascii_json_string("q\""), r#""q\"""#);

        let canonical = r#"{"accuracy_scaled":8734,"model_hash":"mod\u00e8le","round_number":1,"timestamp":1700000000}"#;
        assert_eq!(
            compute_metadata_hash(1, 8734, "modèle", 1_700_000_000),
            format!("{:x}", Sha256::digest(canonical.as_bytes()))
        );
    }

    #[test]
    fn test_metadata_hash_is_canonical() {
        let a = compute_metadata_hash(1, 8734, "model-abc", 1_700_000_000);
        let b = compute_metadata_hash(1, 8734, "model-abc", 1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, compute_metadata_hash(2, 8734, "model-abc", 1_700_000_000));

        // sha256 of the canonical JSON text itself
        let canonical = r#"{"accuracy_scaled":8734,"model_hash":"model-abc","round_number":1,"timestamp":1700000000}"#;
        assert_eq!(a, format!("{:x}", Sha256::digest(canonical.as_bytes())));
    }

    #[test]
    fn test_verify_hash() {
        let mut r = round(1);
        assert!(!r.verify_hash("model-abc"));

        r.metadata_hash = Some(compute_metadata_hash(1, 8734, "model-abc", 1_700_000_000));
        assert!(r.verify_hash("model-abc"));
        assert!(!r.verify_hash("model-xyz"));
    }

    #[test]
    fn test_parse_flex_u64() {
        assert_eq!(parse_flex_u64(&json!(12)), Some(12));
        assert_eq!(parse_flex_u64(&json!("12")), Some(12));
        assert_eq!(parse_flex_u64(&json!("0x1f")), Some(31));
        assert_eq!(parse_flex_u64(&json!(-1)), None);
        assert_eq!(parse_flex_u64(&json!(null)), None);
    }
}
