//! Pipeline configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use txflow_types::NetworkId;
use txflow_utils::LogFormat;

use crate::IngestError;

/// Configuration for the ingestion pipeline and its triggers.
///
/// Can be loaded from a TOML file via [`IngestConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Which network the node serves.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// JSON-RPC endpoint of the node.
    #[serde(default = "default_node_rpc_url")]
    pub node_rpc_url: String,

    #[serde(default)]
    pub node_rpc_user: Option<String>,

    #[serde(default)]
    pub node_rpc_password: Option<String>,

    /// Upper bound on a single node call, in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Upper bound on a single store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Markets whose latest rate is captured with every transaction.
    #[serde(default = "default_tracked_markets")]
    pub tracked_markets: Vec<String>,

    /// Topic notifications are published to.
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,

    #[serde(default = "default_mempool_poll_interval_ms")]
    pub mempool_poll_interval_ms: u64,

    #[serde(default = "default_block_poll_interval_ms")]
    pub block_poll_interval_ms: u64,

    /// Maximum number of transactions processed at once by a trigger.
    #[serde(default = "default_max_concurrent_txs")]
    pub max_concurrent_txs: usize,

    /// Capacity of the mempool listener's seen-txid cache.
    #[serde(default = "default_seen_cache_capacity")]
    pub seen_cache_capacity: usize,

    /// How often the address index is rebuilt from the user store.
    #[serde(default = "default_address_index_refresh_secs")]
    pub address_index_refresh_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Main
}

fn default_node_rpc_url() -> String {
    format!("http://127.0.0.1:{}", NetworkId::Main.default_rpc_port())
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_tracked_markets() -> Vec<String> {
    vec!["Poloniex".to_string(), "Gdax".to_string()]
}

fn default_notification_topic() -> String {
    "TransactionUpdate".to_string()
}

fn default_mempool_poll_interval_ms() -> u64 {
    2_000
}

fn default_block_poll_interval_ms() -> u64 {
    10_000
}

fn default_max_concurrent_txs() -> usize {
    16
}

fn default_seen_cache_capacity() -> usize {
    100_000
}

fn default_address_index_refresh_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl IngestConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, IngestError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| IngestError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, IngestError> {
        let config: Self = toml::from_str(s).map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, IngestError> {
        toml::to_string_pretty(self).map_err(|e| IngestError::Config(e.to_string()))
    }

    /// Reject values the triggers cannot run with.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_concurrent_txs == 0 {
            return Err(IngestError::Config("max_concurrent_txs must be > 0".into()));
        }
        if self.rpc_timeout_ms == 0 || self.store_timeout_ms == 0 {
            return Err(IngestError::Config("timeouts must be > 0".into()));
        }
        if self.mempool_poll_interval_ms == 0 || self.block_poll_interval_ms == 0 {
            return Err(IngestError::Config("poll intervals must be > 0".into()));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn mempool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_poll_interval_ms)
    }

    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }

    pub fn address_index_refresh(&self) -> Duration {
        Duration::from_secs(self.address_index_refresh_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            node_rpc_url: default_node_rpc_url(),
            node_rpc_user: None,
            node_rpc_password: None,
            rpc_timeout_ms: default_rpc_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            tracked_markets: default_tracked_markets(),
            notification_topic: default_notification_topic(),
            mempool_poll_interval_ms: default_mempool_poll_interval_ms(),
            block_poll_interval_ms: default_block_poll_interval_ms(),
            max_concurrent_txs: default_max_concurrent_txs(),
            seen_cache_capacity: default_seen_cache_capacity(),
            address_index_refresh_secs: default_address_index_refresh_secs(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = IngestConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = IngestConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.rpc_timeout_ms, config.rpc_timeout_ms);
        assert_eq!(parsed.tracked_markets, config.tracked_markets);
        assert_eq!(parsed.network, NetworkId::Main);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = IngestConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.notification_topic, "TransactionUpdate");
        assert_eq!(config.tracked_markets, vec!["Poloniex", "Gdax"]);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.max_concurrent_txs, 16);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "test"
            max_concurrent_txs = 4
            log_format = "json"
            tracked_markets = ["Gdax"]
        "#;
        let config = IngestConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::Test);
        assert_eq!(config.max_concurrent_txs, 4);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.tracked_markets, vec!["Gdax"]);
        assert_eq!(config.rpc_timeout_ms, 10_000); // default
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = IngestConfig::from_toml_str("max_concurrent_txs = 0").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "store_timeout_ms = 250").unwrap();
        let config =
            IngestConfig::from_toml_file(file.path().to_str().unwrap()).expect("should load");
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = IngestConfig::from_toml_file("/nonexistent/txflow.toml");
        assert!(matches!(result, Err(IngestError::Config(_))));
    }
}
