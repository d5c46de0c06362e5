use url::Url;

// ============================================================================
// BACKEND (primary source)
// ============================================================================

config_struct! {
    /// Authoritative backend audit log
    pub struct BackendConfig {
        /// Base URL of the backend API
        base_url: String = "http://localhost:8000".to_string(),

        /// Path of the audit log query
        logs_path: String = "/blockchain-logs".to_string(),

        /// Path used to record presentation-initiated activity
        activity_path: String = "/log-activity".to_string(),

        /// Per-request timeout in seconds
        request_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// LEDGER (secondary source)
// ============================================================================

config_struct! {
    /// Distributed ledger recording training rounds
    pub struct LedgerConfig {
        /// Set to false to run backend-only
        enabled: bool = true,

        /// JSON-RPC endpoint for history queries
        rpc_url: String = "http://127.0.0.1:8545".to_string(),

        /// WebSocket endpoint for push notifications
        ws_url: String = "ws://127.0.0.1:8546".to_string(),

        /// Handshake budget; a slower ledger is treated as unavailable for the process lifetime
        connect_timeout_ms: u64 = 2_000,

        /// Per-call timeout once connected
        request_timeout_ms: u64 = 5_000,

        /// Divisor applied to scaled accuracy/loss integers
        scale_factor: f64 = 10_000.0,

        /// RPC method returning the number of recorded rounds
        count_method: String = "getLogCount".to_string(),

        /// RPC method returning one round by number
        round_method: String = "getLog".to_string(),

        /// WebSocket subscription method for newly recorded rounds
        subscribe_method: String = "subscribeTrainingRounds".to_string(),
    }
}

// ============================================================================
// FEED
// ============================================================================

config_struct! {
    /// Reconciled feed behaviour
    pub struct FeedConfig {
        /// Poll cadence while the feed is active
        poll_interval_ms: u64 = 5_000,

        /// Attach the ledger push subscription on activation
        live_updates: bool = true,

        /// Entries printed by the console renderer
        max_display_entries: usize = 50,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        backend: BackendConfig = BackendConfig::default(),
        ledger: LedgerConfig = LedgerConfig::default(),
        feed: FeedConfig = FeedConfig::default(),
    }
}

impl Config {
    /// Check values that would otherwise fail at runtime
    pub fn validate(&self) -> Result<(), String> {
        parse_url("backend.base_url", &self.backend.base_url)?;
        if self.backend.request_timeout_secs == 0 {
            return Err("backend.request_timeout_secs must be greater than 0".to_string());
        }

        if self.ledger.enabled {
            parse_url("ledger.rpc_url", &self.ledger.rpc_url)?;
            parse_url("ledger.ws_url", &self.ledger.ws_url)?;
            if self.ledger.connect_timeout_ms == 0 {
                return Err("ledger.connect_timeout_ms must be greater than 0".to_string());
            }
            if !(self.ledger.scale_factor.is_finite() && self.ledger.scale_factor > 0.0) {
                return Err(format!(
                    "ledger.scale_factor must be a positive number, got {}",
                    self.ledger.scale_factor
                ));
            }
        }

        if self.feed.poll_interval_ms == 0 {
            return Err("feed.poll_interval_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, String> {
    Url::parse(value).map_err(|e| format!("Invalid URL in {} ('{}'): {}", field, value, e))
}
