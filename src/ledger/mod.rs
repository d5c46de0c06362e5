//! Secondary source: the training-round ledger
//!
//! Everything here is best-effort enrichment. The gate makes at most one
//! connection attempt per process; when it fails, history fetches return
//! nothing and live updates never attach.

mod fetcher;
mod gate;
mod rpc;
mod subscriber;
mod types;

pub use fetcher::SecondaryFetcher;
pub use gate::{ConnectionGate, GateState, GateStatus};
pub use rpc::{parse_notification, JsonRpcConnector, JsonRpcLedger};
pub use subscriber::LiveSubscriber;
pub use types::{compute_metadata_hash, descale, parse_flex_u64, LedgerRound};

use crate::errors::FeedResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connected ledger session
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Number of recorded rounds
    async fn round_count(&self) -> FeedResult<u64>;

    /// One round by number, starting at 1
    async fn round(&self, number: u64) -> FeedResult<LedgerRound>;

    /// Stream of newly recorded rounds; closes when the connection drops
    async fn subscribe_rounds(&self) -> FeedResult<mpsc::Receiver<LedgerRound>>;
}

/// Performs the handshake that yields a session
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self) -> FeedResult<Arc<dyn LedgerSource>>;
}
