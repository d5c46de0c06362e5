//! Structured, tag-based console logging
//!
//! ```rust,ignore
//! use auditfeed::logger::{self, LogTag};
//!
//! logger::info(LogTag::Feed, "Feed activated");
//! logger::warning(LogTag::Backend, "Audit log fetch failed: HTTP 502");
//! logger::debug(LogTag::Ledger, "Round 7 fetched"); // only with --debug-ledger
//! ```
//!
//! Call `logger::init()` once at startup, before any services run.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{
    config_from_args, get_logger_config, init_from_args, set_logger_config,
    update_logger_config, LoggerConfig,
};
pub use format::format_plain;
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line flags
pub fn init() {
    config::init_from_args();
}

/// Critical failures, always shown
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Diagnostics, shown only with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Very detailed tracing, shown only with `--verbose`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
