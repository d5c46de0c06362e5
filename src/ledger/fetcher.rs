use super::gate::ConnectionGate;
use crate::feed::LogEntry;
use crate::logger::{self, LogTag};
use std::sync::Arc;

/// Pulls the full round history from the ledger
pub struct SecondaryFetcher {
    gate: Arc<ConnectionGate>,
    scale: f64,
}

impl SecondaryFetcher {
    pub fn new(gate: Arc<ConnectionGate>, scale: f64) -> Self {
        Self { gate, scale }
    }

    pub fn gate(&self) -> &Arc<ConnectionGate> {
        &self.gate
    }

    /// Rounds `1..=N` as feed entries, newest first
    ///
    /// Empty when the gate is not connected. A round that fails to load is
    /// left out; the rest are still returned.
    pub async fn fetch_history(&self) -> Vec<LogEntry> {
        let Some(source) = self.gate.connect().await else {
            return Vec::new();
        };

        let count = match source.round_count().await {
            Ok(count) => count,
            Err(e) => {
                logger::debug(LogTag::Ledger, &format!("Round count unavailable: {}", e));
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        let mut failed = 0u64;
        for number in 1..=count {
            match source.round(number).await {
                Ok(round) => entries.push(round.to_log_entry(self.scale)),
                Err(e) => {
                    failed += 1;
                    logger::debug(LogTag::Ledger, &format!("Round {} unavailable: {}", number, e));
                }
            }
        }

        logger::verbose(
            LogTag::Ledger,
            &format!("Fetched {}/{} ledger rounds ({} failed)", entries.len(), count, failed),
        );

        // ledger order is oldest first
        entries.reverse();
        entries
    }
}
