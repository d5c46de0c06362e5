use super::schemas::Config;
/// Configuration loading and access helpers
///
/// One process-wide `Config` guarded by a read/write lock. Components take
/// the sections they need by value at construction time, so only the binary
/// entry point touches the global.
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Read and parse a TOML file; a missing file yields defaults
pub fn read_config_file(path: &str) -> Result<Config, String> {
    if !Path::new(path).exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

    toml::from_str::<Config>(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))
}

pub fn load_config() -> Result<(), String> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Load configuration from `path` and initialize the global instance
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = read_config_file(path)?;
    config.validate()?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;

    logger::debug(LogTag::Config, &format!("Configuration loaded from '{}'", path));
    Ok(())
}

/// Replace the global configuration with the contents of `path`
pub fn reload_config_from_path(path: &str) -> Result<(), String> {
    let new_config = read_config_file(path)?;
    new_config.validate()?;

    let lock = CONFIG
        .get()
        .ok_or_else(|| "Config not initialized. Call load_config() first.".to_string())?;
    *lock.write() = new_config;

    logger::info(LogTag::Config, &format!("Configuration reloaded from '{}'", path));
    Ok(())
}

/// Read access to the configuration; defaults are used before initialization
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => f(&lock.read()),
        None => f(&Config::default()),
    }
}

/// Clone of the whole configuration, for use across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

pub fn is_config_initialized() -> bool {
    CONFIG.get().is_some()
}

/// Write a configuration to disk as pretty TOML
pub fn save_config(config: &Config, path: &str) -> Result<(), String> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(path, contents)
        .map_err(|e| format!("Failed to write config file '{}': {}", path, e))
}
