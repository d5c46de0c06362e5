//! Primary source: the backend's authoritative audit log

mod client;
mod types;

pub use client::{endpoint_url, BackendClient, HttpClient};
pub use types::{ActivityRecord, LogsPayload};

use crate::errors::FeedResult;
use crate::feed::LogEntry;
use async_trait::async_trait;

/// Authoritative, already-ordered audit log
///
/// `fetch_logs` returns the full newest-first list; the feed replaces its
/// authoritative portion with it on success.
#[async_trait]
pub trait PrimarySource: Send + Sync {
    async fn fetch_logs(&self) -> FeedResult<Vec<LogEntry>>;

    /// Append a presentation-initiated activity to the audit trail
    async fn log_activity(&self, record: &ActivityRecord) -> FeedResult<()>;
}
