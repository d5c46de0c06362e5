/// Log tags identify the subsystem a message came from.
///
/// Each tag maps to a `--debug-<key>` command-line flag that unlocks
/// debug-level output for that subsystem only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Feed,
    Scheduler,
    Backend,
    Ledger,
    Subscriber,
}

impl LogTag {
    /// All tags, in display order
    pub const ALL: [LogTag; 7] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Feed,
        LogTag::Scheduler,
        LogTag::Backend,
        LogTag::Ledger,
        LogTag::Subscriber,
    ];

    /// Key used in `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Feed => "feed",
            LogTag::Scheduler => "scheduler",
            LogTag::Backend => "backend",
            LogTag::Ledger => "ledger",
            LogTag::Subscriber => "subscriber",
        }
    }

    /// Uppercase label used in console and plain output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Feed => "FEED",
            LogTag::Scheduler => "SCHED",
            LogTag::Backend => "BACKEND",
            LogTag::Ledger => "LEDGER",
            LogTag::Subscriber => "LIVE",
        }
    }

    /// Resolve a debug key back to its tag
    pub fn from_debug_key(key: &str) -> Option<Self> {
        LogTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_keys_round_trip() {
        for tag in LogTag::ALL {
            assert_eq!(LogTag::from_debug_key(tag.to_debug_key()), Some(tag));
        }
        assert_eq!(LogTag::from_debug_key("LEDGER"), Some(LogTag::Ledger));
        assert_eq!(LogTag::from_debug_key("pool"), None);
    }
}
