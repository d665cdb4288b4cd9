// =============================================================================
// Hub configuration — CLI flags + environment, read once at startup
// =============================================================================

use std::path::PathBuf;

use clap::Parser;

/// Single long-running hub process. Polls upstream market-data providers,
/// persists normalized snapshots, and serves the LAN-local REST API.
#[derive(Debug, Clone, Parser)]
#[command(name = "ticker-hub", version, about)]
pub struct HubConfig {
    /// Address the REST API binds to.
    #[arg(long, env = "TICKER_HUB_BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    /// Port the REST API listens on.
    #[arg(long, env = "TICKER_HUB_PORT", default_value_t = 8080)]
    pub port: u16,

    /// `tracing` env-filter directive (e.g. `info`, `debug`, `ticker_hub=debug`).
    #[arg(long, env = "TICKER_HUB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory holding the SQLite database file.
    #[arg(long, env = "TICKER_HUB_STATE_DIR", default_value = "./data")]
    pub state_dir: PathBuf,

    /// Directory for log files. The hub itself logs to stdout via `tracing`;
    /// this is surfaced for parity with the CLI surface and any future file
    /// appender.
    #[arg(long, env = "TICKER_HUB_LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,

    /// Equities/crypto refresh cadence, in seconds.
    #[arg(long, env = "TICKER_HUB_UPDATE_INTERVAL_SECS", default_value_t = 300)]
    pub update_interval_secs: u64,

    /// Forex refresh cadence, in seconds.
    #[arg(long, env = "TICKER_HUB_FOREX_INTERVAL_SECS", default_value_t = 3600)]
    pub forex_interval_secs: u64,

    /// Forex symbols per batch request.
    #[arg(long, env = "TICKER_HUB_FOREX_BATCH_SIZE", default_value_t = 8)]
    pub forex_batch_size: usize,

    /// Delay between forex batch requests, in seconds.
    #[arg(long, env = "TICKER_HUB_FOREX_BATCH_DELAY_SECS", default_value_t = 10)]
    pub forex_batch_delay_secs: u64,

    /// Forex provider credit budget per minute (one symbol = one credit).
    #[arg(long, env = "TICKER_HUB_FOREX_CREDITS_PER_MINUTE", default_value_t = 8)]
    pub forex_credits_per_minute: u32,

    /// Forex provider credit budget per day.
    #[arg(long, env = "TICKER_HUB_FOREX_CREDITS_PER_DAY", default_value_t = 800)]
    pub forex_credits_per_day: u32,

    /// Delay between equities/crypto upstream calls within one tick, in
    /// milliseconds.
    #[arg(long, env = "TICKER_HUB_RATE_LIMIT_DELAY_MS", default_value_t = 500)]
    pub rate_limit_delay_ms: u64,

    /// Timeout applied to every upstream HTTP call, in seconds.
    #[arg(long, env = "TICKER_HUB_UPSTREAM_TIMEOUT_SECS", default_value_t = 15)]
    pub upstream_timeout_secs: u64,

    /// Forex provider API key, used only when the store has no credential
    /// row for the forex provider yet.
    #[arg(long, env = "TICKER_HUB_FOREX_API_KEY")]
    pub forex_api_key: Option<String>,

    /// Optional LAN IP hint consumed by the out-of-scope admin UI; the hub
    /// reads and ignores it.
    #[arg(long, env = "TICKER_HUB_LAN_IP_HINT")]
    pub lan_ip_hint: Option<String>,
}

impl HubConfig {
    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("hub.db")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_bare_invocation() {
        let config = HubConfig::parse_from(["ticker-hub"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.update_interval_secs, 300);
        assert_eq!(config.forex_interval_secs, 3600);
        assert_eq!(config.forex_batch_size, 8);
        assert_eq!(config.forex_credits_per_minute, 8);
        assert_eq!(config.forex_credits_per_day, 800);
    }

    #[test]
    fn db_path_joins_state_dir() {
        let mut config = HubConfig::parse_from(["ticker-hub"]);
        config.state_dir = PathBuf::from("/tmp/hub-state");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/hub-state/hub.db"));
    }
}
