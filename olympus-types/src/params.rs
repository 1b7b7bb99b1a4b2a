use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::DEFAULT_RELAYER_PORT;
use crate::error::TypesError;

/// Static parameters of one Olympus network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// Short network name, also used to namespace the DHT protocol.
    pub name: &'static str,
    /// Magic number that prefixes every frame on this network.
    pub net_magic: u32,
    /// Rendezvous strings, oldest protocol version first.
    pub rendezvous_strings: &'static [&'static str],
    /// Well-known relayers used to bootstrap the DHT (multiaddrs with `/p2p/`).
    pub relayers: &'static [&'static str],
    /// Default listen port.
    pub default_port: u16,
}

impl ChainParams {
    /// Kademlia protocol name for this network.
    pub fn kad_protocol(&self) -> String {
        format!("/ogen/{}/kad/1.0.0", self.name)
    }

    /// Identify protocol version advertised to peers.
    pub fn identify_protocol(&self) -> String {
        format!("/ogen/{}/relayer/1.0.0", self.name)
    }
}

pub static MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    net_magic: 0x4f4c_5950, // "OLYP"
    rendezvous_strings: &["olympus-mainnet-v0.1.0", "olympus-mainnet-v0.2.0"],
    relayers: &[
        "/dns4/relayer-1.olympus.network/tcp/25000/p2p/12D3KooWPR2hZfhkhLspCEQnhx5BraiQnDYbMeYeAMoSx6dFPVCm",
        "/dns4/relayer-2.olympus.network/tcp/25000/p2p/12D3KooWCmu9rZtoE5soUUrWPceb9xbeULD6DWuk6Uy9Ww4ZV6dM",
    ],
    default_port: DEFAULT_RELAYER_PORT,
};

pub static TESTNET: ChainParams = ChainParams {
    name: "testnet",
    net_magic: 0x4f54_4553, // "OTES"
    rendezvous_strings: &["olympus-testnet-v0.1.0", "olympus-testnet-v0.2.0"],
    relayers: &[
        "/dns4/testnet-relayer-1.olympus.network/tcp/25000/p2p/12D3KooWDRZhZcemi7T5EAts9qEW19iqt1jnooDn1krpZ9hBhdFE",
        "/dns4/testnet-relayer-2.olympus.network/tcp/25000/p2p/12D3KooWLKpX8ejCKeokC4L9tqAn7AXmjGSMMaZ2i9nLPfFMDcu7",
    ],
    default_port: DEFAULT_RELAYER_PORT,
};

/// Which built-in network to relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkId {
    /// Short lowercase identifier (for CLI/config).
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Testnet => "testnet",
            NetworkId::Mainnet => "mainnet",
        }
    }

    /// Parse from a string identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "testnet" => Some(NetworkId::Testnet),
            "mainnet" => Some(NetworkId::Mainnet),
            _ => None,
        }
    }

    /// The chain parameters for this network.
    pub fn params(&self) -> &'static ChainParams {
        match self {
            NetworkId::Testnet => &TESTNET,
            NetworkId::Mainnet => &MAINNET,
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetworkId::parse(s).ok_or_else(|| TypesError::UnknownNetwork(s.to_string()))
    }
}
