/// Core logging: decides whether a message is shown, then hands it to `format`
use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Filtering rules:
/// 1. Errors are always shown
/// 2. Anything below the minimum level threshold is dropped
/// 3. Debug requires `--debug-<tag>` (or `--verbose`)
/// 4. Verbose requires `--verbose` or `--verbose-<tag>`
/// 5. A non-empty `enabled_tags` set restricts output to those tags
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();

    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(tag);
    }

    if level > config.min_level {
        return false;
    }

    if level == LogLevel::Debug && !is_debug_enabled_for_tag(tag) {
        return false;
    }

    config.enabled_tags.is_empty() || config.enabled_tags.contains(tag)
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level, message);
}
