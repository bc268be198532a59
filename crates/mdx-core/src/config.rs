//! Configuration parsing for the MDX normalization layer.
//!
//! All modules read their settings from a single JSON config file with a
//! `connections` array where each entry describes one venue instance.
//!
//! # Example config
//!
//! ```json
//! {
//!   "connections": [{
//!     "venue": "okex",
//!     "version": "1",
//!     "symbols": ["btc_usd", "eth_usd"],
//!     "ping_interval_sec": 25,
//!     "request_timeout_sec": 10
//!   }]
//! }
//! ```

use serde::Deserialize;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Optional log directory for daily-rotating file output; passed to
    /// [`crate::logging::init_logging`] as its `log_dir`.
    pub log_path: Option<String>,

    /// Array of connection configs — one per venue instance.
    pub connections: Vec<ConnectionConfig>,
}

/// A single venue connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Venue identifier: `"okex"`, `"binance"`.
    pub venue: String,

    /// API version override (defaults to the venue adapter's version).
    pub version: Option<String>,

    /// REST base URL override (defaults to the venue adapter's URL).
    pub rest_base_url: Option<String>,

    /// WebSocket base URL override.
    pub ws_base_url: Option<String>,

    /// Symbols to subscribe (venue-native spelling, e.g. `"btc_usd"`).
    pub symbols: Option<Vec<String>>,

    /// Ping interval in seconds (venue-level keep-alive).
    pub ping_interval_sec: Option<u64>,

    /// Per-request timeout for REST calls, in seconds.
    pub request_timeout_sec: Option<u64>,
}

impl ConnectionConfig {
    /// Effective symbol list (empty when not configured).
    pub fn effective_symbols(&self) -> Vec<String> {
        self.symbols.clone().unwrap_or_default()
    }

    /// Effective REST timeout, defaulting to 10 seconds.
    pub fn effective_timeout_sec(&self) -> u64 {
        self.request_timeout_sec.unwrap_or(10)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r#"{
            "connections": [{
                "venue": "okex",
                "symbols": ["btc_usd"],
                "ping_interval_sec": 25
            }]
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.connections.len(), 1);
        let conn = &cfg.connections[0];
        assert_eq!(conn.venue, "okex");
        assert_eq!(conn.effective_symbols(), vec!["btc_usd"]);
        assert_eq!(conn.effective_timeout_sec(), 10);
    }
}
