//! Configuration: TOML file with per-section defaults

#[macro_use]
mod macros;
mod schemas;
mod utils;

pub use schemas::{BackendConfig, Config, FeedConfig, LedgerConfig};
pub use utils::{
    get_config_clone, is_config_initialized, load_config, load_config_from_path,
    read_config_file, reload_config_from_path, save_config, with_config, CONFIG,
    CONFIG_FILE_PATH,
};
