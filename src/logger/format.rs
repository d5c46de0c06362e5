//! Log formatting and console output
//!
//! Lines look like `12:04:31 [LEDGER ] [WARN ] message`, with the tag and
//! level colorized. Broken pipes (e.g. `auditfeed --once | head`) are ignored.

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, stdout, ErrorKind, Write};

/// Tag column width, keeps messages aligned
const TAG_WIDTH: usize = 7;
/// Level column width
const LEVEL_WIDTH: usize = 5;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(&tag),
        format_level(level),
        message
    );

    if level == LogLevel::Error {
        write_safe(&mut stderr(), &line);
    } else {
        write_safe(&mut stdout(), &line);
    }
}

/// Plain, uncolored rendering of a log line (used for tests and piping)
pub fn format_plain(tag: LogTag, level: LogLevel, message: &str) -> String {
    format!(
        "[{:<tw$}] [{:<lw$}] {}",
        tag.to_plain_string(),
        level.as_str(),
        message,
        tw = TAG_WIDTH,
        lw = LEVEL_WIDTH
    )
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Feed => label.bright_green().bold(),
        LogTag::Scheduler => label.bright_blue().bold(),
        LogTag::Backend => label.bright_cyan().bold(),
        LogTag::Ledger => label.bright_magenta().bold(),
        LogTag::Subscriber => label.bright_purple().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.yellow().bold(),
        LogLevel::Info => label.normal(),
        LogLevel::Debug => label.bright_black(),
        LogLevel::Verbose => label.dimmed(),
    }
}

fn write_safe<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("logger write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_format_aligns_columns() {
        let line = format_plain(LogTag::Ledger, LogLevel::Warning, "gate failed");
        assert_eq!(line, "[LEDGER ] [WARN ] gate failed");
    }
}
