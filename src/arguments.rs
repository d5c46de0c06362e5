/// Command-line argument handling
///
/// Arguments are captured once into a process-wide store so any module can
/// check flags without threading them through constructors. Tests and tools
/// can replace the store with `set_cmd_args`.
use crate::config::CONFIG_FILE_PATH;
use crate::logger::LogTag;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Override the captured arguments
pub fn set_cmd_args(args: Vec<String>) {
    *CMD_ARGS.lock() = args;
}

/// Copy of the current arguments (the lock is not held by the caller)
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Value following a flag, supporting both `--flag value` and `--flag=value`
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    let prefix = format!("{}=", flag);
    for (i, arg) in args.iter().enumerate() {
        if arg == flag {
            return args.get(i + 1).cloned();
        }
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.to_string());
        }
    }
    None
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Single refresh, print the feed, exit
pub fn is_once_enabled() -> bool {
    has_arg("--once")
}

/// Configuration file path (`--config <path>`), defaulting to `data/config.toml`
pub fn get_config_path() -> String {
    get_arg_value("--config").unwrap_or_else(|| CONFIG_FILE_PATH.to_string())
}

pub fn print_help() {
    println!("auditfeed - reconciled audit-log feed (backend log + ledger rounds)");
    println!();
    println!("USAGE:");
    println!("    auditfeed [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>     Configuration file (default: {})", CONFIG_FILE_PATH);
    println!("    --once              Refresh once, print the feed and exit");
    println!("    --verbose           Show all debug and trace output");
    println!("    --quiet             Only show errors");
    println!("    --only=<tags>       Comma-separated tags to show");
    println!("    -h, --help          Print this help");
    println!();
    println!("DEBUG FLAGS:");
    for tag in LogTag::ALL {
        println!("    --debug-{}", tag.to_debug_key());
    }
}
