//! Console rendering of the feed

use super::store::FeedSnapshot;
use super::types::{ActionCategory, ActionKind, LogEntry};
use colored::*;

/// `0x1234ab...9f0e` style abbreviation for long hashes
pub fn short_hash(hash: &str) -> String {
    if hash.chars().count() <= 16 {
        return hash.to_string();
    }
    let head: String = hash.chars().take(8).collect();
    let tail: String = hash.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{}...{}", head, tail)
}

fn format_action(action: &ActionKind) -> ColoredString {
    let label = format!("{:<22}", action.as_str());
    match action.category() {
        ActionCategory::Upload => label.bright_blue(),
        ActionCategory::Login if *action == ActionKind::LoginFailed => label.bright_red(),
        ActionCategory::Login => label.cyan(),
        ActionCategory::Training => label.bright_green().bold(),
        ActionCategory::Navigation => label.white().dimmed(),
        ActionCategory::Screening => label.magenta(),
        ActionCategory::System => label.yellow(),
        ActionCategory::Other => label.normal(),
    }
}

pub fn render_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {}  {}",
        entry.display_time().dimmed(),
        format_action(&entry.action),
        entry.details
    );

    if !entry.actor.is_empty() {
        line.push_str(&format!("  {}", format!("by {}", entry.actor).bright_black()));
    }
    if let Some(count) = entry.record_count.filter(|_| !entry.is_training_round()) {
        line.push_str(&format!("  ({} records)", count));
    }
    if let Some(tx) = &entry.tx_hash {
        line.push_str(&format!("  {}", short_hash(tx).bright_black()));
    }
    line
}

/// Status header plus up to `max` newest entries
pub fn render_snapshot(snapshot: &FeedSnapshot, max: usize) -> String {
    let mut out = String::new();

    let mut header = format!("Audit feed: {} entries", snapshot.len());
    if snapshot.loading {
        header.push_str(" (refreshing)");
    }
    out.push_str(&header.bold().to_string());
    out.push('\n');

    if let Some(error) = &snapshot.error {
        out.push_str(&format!("{}\n", format!("backend unavailable: {}", error).bright_red()));
    }

    if snapshot.is_empty() {
        out.push_str(&"  no activity recorded yet\n".dimmed().to_string());
        return out;
    }

    for entry in snapshot.entries.iter().take(max) {
        out.push_str("  ");
        out.push_str(&render_entry(entry));
        out.push('\n');
    }
    if snapshot.len() > max {
        out.push_str(&format!("  ... {} older entries\n", snapshot.len() - max));
    }
    out
}
