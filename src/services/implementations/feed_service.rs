use crate::feed::{render, AuditFeed, FeedSnapshot};
use crate::ledger::GateState;
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Keeps the audit feed active and prints it to the console as it changes
pub struct FeedService {
    feed: Arc<AuditFeed>,
    max_display_entries: usize,
}

impl FeedService {
    pub fn new(feed: Arc<AuditFeed>, max_display_entries: usize) -> Self {
        Self { feed, max_display_entries }
    }
}

/// Whether a snapshot differs from what was last printed
fn worth_printing(last: Option<&FeedSnapshot>, next: &FeedSnapshot) -> bool {
    if next.loading {
        return false;
    }
    match last {
        Some(last) => !Arc::ptr_eq(&last.entries, &next.entries) || last.error != next.error,
        None => true,
    }
}

#[async_trait]
impl Service for FeedService {
    fn name(&self) -> &'static str {
        "audit_feed"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let feed = self.feed.clone();
        let max = self.max_display_entries;
        let mut rx = feed.subscribe();

        feed.set_active(true);

        let handle = tokio::spawn(async move {
            let shutdown_signal = shutdown.notified();
            tokio::pin!(shutdown_signal);
            let mut last_printed: Option<FeedSnapshot> = None;

            loop {
                tokio::select! {
                    _ = &mut shutdown_signal => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        if worth_printing(last_printed.as_ref(), &snapshot) {
                            println!("{}", render::render_snapshot(&snapshot, max));
                            last_printed = Some(snapshot);
                        }
                    }
                }
            }

            feed.set_active(false);
            logger::debug(LogTag::Feed, "Feed console loop stopped");
        });

        Ok(vec![handle])
    }

    async fn stop(&mut self) -> Result<(), String> {
        self.feed.shutdown();
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        if !self.feed.is_active() {
            return ServiceHealth::Stopping;
        }

        if let Some(error) = self.feed.snapshot().error {
            return ServiceHealth::Degraded(format!("serving cached feed, backend error: {}", error));
        }

        let gate = self.feed.gate_status();
        // a disabled ledger never attempts, so only a real failure degrades
        if gate.state == GateState::Failed && gate.attempts > 0 {
            return ServiceHealth::Degraded(format!(
                "ledger unavailable ({}), backend only",
                gate.last_error.unwrap_or_default()
            ));
        }

        ServiceHealth::Healthy
    }
}
