/// One-shot connection gate for the ledger
///
/// The first caller of `connect()` runs the handshake under a short timeout;
/// concurrent callers wait on that same attempt. The outcome is kept for the
/// process lifetime, so a failed ledger is never retried.
use super::{LedgerConnector, LedgerSource};
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unattempted,
    Connected,
    Failed,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateState::Unattempted => "unattempted",
            GateState::Connected => "connected",
            GateState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the gate for health reporting
#[derive(Debug, Clone, PartialEq)]
pub struct GateStatus {
    pub state: GateState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

enum Session {
    Connected(Arc<dyn LedgerSource>),
    Failed(String),
}

pub struct ConnectionGate {
    connector: Option<Arc<dyn LedgerConnector>>,
    timeout: Duration,
    session: OnceCell<Session>,
    attempts: AtomicU32,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

impl ConnectionGate {
    pub fn new(connector: Arc<dyn LedgerConnector>, timeout: Duration) -> Self {
        Self {
            connector: Some(connector),
            timeout,
            session: OnceCell::new(),
            attempts: AtomicU32::new(0),
            connected_at: Mutex::new(None),
        }
    }

    /// Gate that starts out failed; used when the ledger is turned off
    pub fn disabled() -> Self {
        Self {
            connector: None,
            timeout: Duration::ZERO,
            session: OnceCell::new_with(Some(Session::Failed("ledger disabled".to_string()))),
            attempts: AtomicU32::new(0),
            connected_at: Mutex::new(None),
        }
    }

    /// Session handle, running the handshake if nobody has yet
    pub async fn connect(&self) -> Option<Arc<dyn LedgerSource>> {
        match self.session.get_or_init(|| self.handshake()).await {
            Session::Connected(source) => Some(source.clone()),
            Session::Failed(_) => None,
        }
    }

    /// Session handle without triggering a handshake
    pub fn session(&self) -> Option<Arc<dyn LedgerSource>> {
        match self.session.get() {
            Some(Session::Connected(source)) => Some(source.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> GateState {
        match self.session.get() {
            None => GateState::Unattempted,
            Some(Session::Connected(_)) => GateState::Connected,
            Some(Session::Failed(_)) => GateState::Failed,
        }
    }

    /// Handshakes performed so far; never exceeds 1
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> GateStatus {
        let last_error = match self.session.get() {
            Some(Session::Failed(reason)) => Some(reason.clone()),
            _ => None,
        };

        GateStatus {
            state: self.state(),
            attempts: self.attempts(),
            last_error,
            connected_at: *self.connected_at.lock(),
        }
    }

    async fn handshake(&self) -> Session {
        let Some(connector) = &self.connector else {
            return Session::Failed("no ledger connector".to_string());
        };

        self.attempts.fetch_add(1, Ordering::SeqCst);
        logger::debug(
            LogTag::Ledger,
            &format!("Connecting to ledger (timeout {}ms)", self.timeout.as_millis()),
        );

        match tokio::time::timeout(self.timeout, connector.connect()).await {
            Ok(Ok(source)) => {
                *self.connected_at.lock() = Some(Utc::now());
                logger::info(LogTag::Ledger, "Ledger connected");
                Session::Connected(source)
            }
            Ok(Err(e)) => {
                logger::warning(
                    LogTag::Ledger,
                    &format!("Ledger unavailable, continuing with backend only: {}", e),
                );
                Session::Failed(e.to_string())
            }
            Err(_) => {
                let reason =
                    format!("handshake timed out after {}ms", self.timeout.as_millis());
                logger::warning(
                    LogTag::Ledger,
                    &format!("Ledger unavailable, continuing with backend only: {}", reason),
                );
                Session::Failed(reason)
            }
        }
    }
}
