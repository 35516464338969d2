//! Default values for optional settings

/// Bind all interfaces on port 80
pub const DEFAULT_LISTEN_ADDR: &str = ":80";

pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_COLLECTOR_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.us/";

pub fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}
