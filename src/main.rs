use anyhow::{anyhow, Context};
use auditfeed::{
    arguments::{get_config_path, is_help_requested, is_once_enabled, print_help},
    config::{self, get_config_clone},
    feed::{render, AuditFeed},
    logger::{self, LogTag},
    services::{implementations::FeedService, ServiceManager},
};
use std::sync::Arc;
use std::time::Duration;

/// Entry point for the audit feed
///
/// - `--once`: one refresh, print the feed, exit
/// - default: keep the feed active and print changes until ctrl-c
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    if is_help_requested() {
        print_help();
        return Ok(());
    }

    let config_path = get_config_path();
    config::load_config_from_path(&config_path)
        .map_err(|e| anyhow!("loading configuration from '{}': {}", config_path, e))?;
    let config = get_config_clone();

    logger::info(
        LogTag::System,
        &format!(
            "auditfeed starting (backend {}, ledger {})",
            config.backend.base_url,
            if config.ledger.enabled { config.ledger.rpc_url.as_str() } else { "disabled" }
        ),
    );

    let feed = Arc::new(AuditFeed::from_config(&config).context("building audit feed")?);

    if is_once_enabled() {
        return run_once(&feed, &config).await;
    }

    let mut manager = ServiceManager::new(config.clone());
    manager.register(Box::new(FeedService::new(
        feed.clone(),
        config.feed.max_display_entries,
    )));
    manager.start_all().await.map_err(|e| anyhow!(e))?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    logger::info(LogTag::System, "Shutdown requested");

    manager.stop_all().await.map_err(|e| anyhow!(e))?;
    Ok(())
}

/// Activate, wait for the first backend response (and a ledger merge if one
/// lands in time), print, deactivate
async fn run_once(feed: &AuditFeed, config: &config::Config) -> anyhow::Result<()> {
    let mut rx = feed.subscribe();
    feed.set_active(true);

    let budget = Duration::from_secs(config.backend.request_timeout_secs)
        + Duration::from_millis(config.ledger.connect_timeout_ms);

    let first = tokio::time::timeout(
        budget,
        rx.wait_for(|snapshot| snapshot.updated_at.is_some() || snapshot.error.is_some()),
    )
    .await
    .map(|waited| waited.map(|_| ()));

    match first {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => return Err(anyhow!("feed closed before the first refresh")),
        Err(_) => logger::warning(LogTag::System, "Timed out waiting for the backend"),
    }

    // give the background ledger merge a moment to land
    let _ = tokio::time::timeout(
        Duration::from_millis(config.ledger.request_timeout_ms),
        rx.changed(),
    )
    .await;

    let snapshot = feed.snapshot();
    println!("{}", render::render_snapshot(&snapshot, config.feed.max_display_entries));
    feed.shutdown();

    match snapshot.error {
        Some(error) if snapshot.is_empty() => Err(anyhow!("backend unavailable: {}", error)),
        _ => Ok(()),
    }
}
