use std::net::Ipv4Addr;
use std::time::Duration;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use olympus_types::constants::{
    DEFAULT_RELAYER_PORT, IDLE_CONNECTION_TIMEOUT, MAX_RELAYER_CONNECTIONS, REDISCOVER_INTERVAL,
    SHUTDOWN_GRACE_PERIOD,
};
use olympus_types::ChainParams;

use crate::discovery::{DiscoveryRetry, DiscoverySettings};

/// Configuration for a relayer's network layer.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Addresses to listen on.
    pub listen_addrs: Vec<Multiaddr>,
    /// Bootstrap relayer addresses (multiaddr strings ending in `/p2p/<id>`).
    pub boot_nodes: Vec<String>,
    /// Rendezvous strings to advertise and discover under, in version order.
    pub rendezvous_strings: Vec<String>,
    /// Maximum number of simultaneous connections.
    pub max_connections: usize,
    /// Wait between a closed peer lookup and the next.
    pub rediscover_interval: Duration,
    /// What a discovery loop does after a hard lookup error.
    pub discovery_retry: DiscoveryRetry,
    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
    /// How long shutdown waits for tasks before aborting them.
    pub shutdown_grace: Duration,
}

impl RelayConfig {
    /// Defaults for `params`: its listen port, rendezvous strings and
    /// bootstrap relayers.
    pub fn for_network(params: &ChainParams) -> Self {
        Self {
            listen_addrs: vec![any_ipv4(params.default_port)],
            boot_nodes: params.relayers.iter().map(|s| s.to_string()).collect(),
            rendezvous_strings: params
                .rendezvous_strings
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        }
    }

    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            rediscover_interval: self.rediscover_interval,
            retry: self.discovery_retry,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec![any_ipv4(DEFAULT_RELAYER_PORT)],
            boot_nodes: Vec::new(),
            rendezvous_strings: Vec::new(),
            max_connections: MAX_RELAYER_CONNECTIONS,
            rediscover_interval: REDISCOVER_INTERVAL,
            discovery_retry: DiscoveryRetry::Stop,
            idle_timeout: IDLE_CONNECTION_TIMEOUT,
            shutdown_grace: SHUTDOWN_GRACE_PERIOD,
        }
    }
}

fn any_ipv4(port: u16) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::Ip4(Ipv4Addr::UNSPECIFIED))
        .with(Protocol::Tcp(port))
}
