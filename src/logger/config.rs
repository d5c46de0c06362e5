/// Logger configuration: threshold level plus per-tag debug switches
///
/// Populated from command-line flags at startup (`init_from_args`) and
/// readable from any thread afterwards.
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages less severe than this are dropped
    pub min_level: LogLevel,
    /// Tags with `--debug-<tag>` enabled
    pub debug_tags: HashSet<LogTag>,
    /// Tags with `--verbose-<tag>` enabled
    pub verbose_tags: HashSet<LogTag>,
    /// When non-empty, only these tags are shown (errors excepted)
    pub enabled_tags: HashSet<LogTag>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn update_logger_config<F>(update: F)
where
    F: FnOnce(&mut LoggerConfig),
{
    update(&mut LOGGER_CONFIG.write());
}

/// Build a logger configuration from a list of command-line arguments
pub fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    for arg in args {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Error;
        } else if let Some(key) = arg.strip_prefix("--debug-") {
            if let Some(tag) = LogTag::from_debug_key(key) {
                config.debug_tags.insert(tag);
            }
        } else if let Some(key) = arg.strip_prefix("--verbose-") {
            if let Some(tag) = LogTag::from_debug_key(key) {
                config.verbose_tags.insert(tag);
                config.debug_tags.insert(tag);
            }
        } else if let Some(keys) = arg.strip_prefix("--only=") {
            config.enabled_tags = keys.split(',').filter_map(LogTag::from_debug_key).collect();
        }
    }

    config
}

/// Initialize the global logger configuration from the process arguments
pub fn init_from_args() {
    set_logger_config(config_from_args(&arguments::get_cmd_args()));
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.min_level == LogLevel::Verbose || config.debug_tags.contains(tag)
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().verbose_tags.contains(tag)
}
