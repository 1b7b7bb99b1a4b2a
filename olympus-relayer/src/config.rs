use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use olympus_relay::discovery::DiscoveryRetry;
use olympus_relay::RelayConfig;
use olympus_types::constants::{
    DEFAULT_RELAYER_PORT, IDLE_CONNECTION_TIMEOUT, MAX_RELAYER_CONNECTIONS, REDISCOVER_INTERVAL,
};
use olympus_types::NetworkId;

use crate::addrs::listen_multiaddrs;
use crate::error::NodeError;

/// Name of the file `init` writes.
pub const CONFIG_FILE_NAME: &str = "olympus-relayer.toml";

/// Every section and field falls back to its default, so a file only needs
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Which network to relay: "testnet" or "mainnet".
    #[serde(default)]
    pub network: NetworkId,
    /// Directory holding the node key and the log file.
    #[serde(default = "default_datadir")]
    pub datadir: String,
    #[serde(default)]
    pub p2p: P2pConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    /// Local IPs to listen on.
    pub listen_ips: Vec<IpAddr>,
    pub port: u16,
    /// Extra bootstrap relayers, on top of the network's own.
    pub boot_nodes: Vec<String>,
    /// Dial the network's well-known relayers at startup.
    pub use_default_relayers: bool,
    pub max_connections: usize,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub rediscover_interval_secs: u64,
    /// "stop" or "backoff" after a hard lookup error.
    pub retry: DiscoveryRetry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Write logs to `<datadir>/relayer.log` instead of stdout.
    pub logfile: bool,
}

fn default_datadir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".olympus-relayer").to_string_lossy().into_owned())
        .unwrap_or_else(|| "./olympus-relayer-data".to_string())
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::default(),
            datadir: default_datadir(),
            p2p: P2pConfig::default(),
            discovery: DiscoveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_ips: vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)],
            port: DEFAULT_RELAYER_PORT,
            boot_nodes: Vec::new(),
            use_default_relayers: true,
            max_connections: MAX_RELAYER_CONNECTIONS,
            idle_timeout_secs: IDLE_CONNECTION_TIMEOUT.as_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            rediscover_interval_secs: REDISCOVER_INTERVAL.as_secs(),
            retry: DiscoveryRetry::Stop,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            logfile: false,
        }
    }
}

impl RelayerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: RelayerConfig =
            toml::from_str(&contents).map_err(|e| NodeError::ConfigError {
                reason: format!("failed to parse config file '{}': {}", path, e),
            })?;
        Ok(config)
    }

    /// Initialize a default configuration file in the given directory.
    pub fn init(dir: &str) -> Result<PathBuf, NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }

        let config = RelayerConfig::default();
        let toml_str = toml::to_string_pretty(&config).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to serialize default config: {}", e),
        })?;

        let config_path = dir_path.join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, toml_str)?;

        Ok(config_path)
    }

    pub fn datadir(&self) -> &Path {
        Path::new(&self.datadir)
    }

    /// Bootstrap relayers to dial: the network's own (unless disabled)
    /// followed by any configured extras.
    pub fn boot_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = if self.p2p.use_default_relayers {
            self.network
                .params()
                .relayers
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            Vec::new()
        };
        for node in &self.p2p.boot_nodes {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }

    /// Network-layer settings for the relay.
    pub fn relay_config(&self) -> Result<RelayConfig, NodeError> {
        if self.p2p.listen_ips.is_empty() {
            return Err(NodeError::ConfigError {
                reason: "p2p.listen_ips must not be empty".to_string(),
            });
        }
        if self.p2p.max_connections == 0 {
            return Err(NodeError::ConfigError {
                reason: "p2p.max_connections must be at least 1".to_string(),
            });
        }

        let mut relay = RelayConfig::for_network(self.network.params());
        relay.listen_addrs = listen_multiaddrs(&self.p2p.listen_ips, self.p2p.port);
        relay.boot_nodes = self.boot_nodes();
        relay.max_connections = self.p2p.max_connections;
        relay.idle_timeout = Duration::from_secs(self.p2p.idle_timeout_secs);
        relay.rediscover_interval = Duration::from_secs(self.discovery.rediscover_interval_secs);
        relay.discovery_retry = self.discovery.retry;
        Ok(relay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayerConfig::default();
        assert_eq!(config.network, NetworkId::Testnet);
        assert_eq!(config.p2p.port, 25000);
        assert_eq!(config.p2p.max_connections, 256);
        assert_eq!(config.discovery.rediscover_interval_secs, 10);
        assert_eq!(config.discovery.retry, DiscoveryRetry::Stop);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = RelayerConfig::default();
        config.network = NetworkId::Mainnet;
        config.discovery.retry = DiscoveryRetry::Backoff;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("network = \"mainnet\""));
        assert!(toml_str.contains("retry = \"backoff\""));

        let deserialized: RelayerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.network, NetworkId::Mainnet);
        assert_eq!(deserialized.discovery.retry, DiscoveryRetry::Backoff);
        assert_eq!(deserialized.p2p.listen_ips, config.p2p.listen_ips);
    }

    #[test]
    fn test_init_creates_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let path = RelayerConfig::init(dir).unwrap();

        assert_eq!(path, tmp.path().join(CONFIG_FILE_NAME));
        let config = RelayerConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.p2p.port, DEFAULT_RELAYER_PORT);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = RelayerConfig::load("/nonexistent/path/olympus-relayer.toml");
        assert!(matches!(result, Err(NodeError::ConfigError { .. })));
    }

    #[test]
    fn test_load_rejects_unknown_network() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        let contents = toml::to_string_pretty(&RelayerConfig::default())
            .unwrap()
            .replace("network = \"testnet\"", "network = \"devnet\"");
        std::fs::write(&path, contents).unwrap();
        assert!(RelayerConfig::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RelayerConfig = toml::from_str("network = \"mainnet\"").unwrap();
        assert_eq!(config.network, NetworkId::Mainnet);
        assert_eq!(config.datadir, RelayerConfig::default().datadir);
        assert_eq!(config.p2p.port, DEFAULT_RELAYER_PORT);
        assert!(config.p2p.use_default_relayers);
        assert_eq!(config.logging.level, "info");

        let config: RelayerConfig = toml::from_str("[p2p]\nport = 26000\n").unwrap();
        assert_eq!(config.p2p.port, 26000);
        assert_eq!(config.p2p.listen_ips, vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)]);
        assert_eq!(config.p2p.max_connections, MAX_RELAYER_CONNECTIONS);
        assert_eq!(config.discovery.rediscover_interval_secs, 10);
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[discovery]\nretry = \"backoff\"\n").unwrap();
        let config = RelayerConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.discovery.retry, DiscoveryRetry::Backoff);
        assert_eq!(config.p2p.idle_timeout_secs, IDLE_CONNECTION_TIMEOUT.as_secs());
        assert!(!config.logging.logfile);
    }

    #[test]
    fn test_boot_nodes_merge_defaults_and_extras() {
        let mut config = RelayerConfig::default();
        let default_count = NetworkId::Testnet.params().relayers.len();
        config
            .p2p
            .boot_nodes
            .push("/ip4/10.0.0.1/tcp/25000/p2p/12D3KooWDRZhZcemi7T5EAts9qEW19iqt1jnooDn1krpZ9hBhdFE".to_string());
        assert_eq!(config.boot_nodes().len(), default_count + 1);

        config.p2p.use_default_relayers = false;
        assert_eq!(config.boot_nodes().len(), 1);
    }

    #[test]
    fn test_relay_config_conversion() {
        let mut config = RelayerConfig::default();
        config.p2p.port = 26000;
        config.discovery.rediscover_interval_secs = 3;
        let relay = config.relay_config().unwrap();
        assert_eq!(relay.listen_addrs[0].to_string(), "/ip4/0.0.0.0/tcp/26000");
        assert_eq!(relay.rediscover_interval, Duration::from_secs(3));
        assert_eq!(
            relay.rendezvous_strings.len(),
            NetworkId::Testnet.params().rendezvous_strings.len()
        );
    }

    #[test]
    fn test_relay_config_rejects_empty_listen_ips() {
        let mut config = RelayerConfig::default();
        config.p2p.listen_ips.clear();
        assert!(config.relay_config().is_err());
    }
}
