use libp2p::{Multiaddr, PeerId};
use std::collections::HashMap;
use std::time::Instant;

use crate::notifier::Direction;

/// Information about a connected peer.
#[derive(Debug)]
pub struct PeerInfo {
    /// Direction of the first connection that is still open.
    pub direction: Direction,
    /// Number of open connections to this peer.
    pub connections: usize,
    /// Agent string reported via identify.
    pub agent_version: Option<String>,
    /// When this peer connected.
    pub connected_at: Instant,
}

/// Tracks connected peers and the connection limit.
pub struct PeerManager {
    peers: HashMap<PeerId, PeerInfo>,
    max_connections: usize,
}

impl PeerManager {
    /// Create a new PeerManager with a maximum connection limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_connections,
        }
    }

    /// Record a new connection. Returns false if the limit is reached and
    /// the peer was not already connected.
    pub fn add_connection(&mut self, peer_id: PeerId, direction: Direction) -> bool {
        if let Some(info) = self.peers.get_mut(&peer_id) {
            info.connections += 1;
            return true;
        }
        if self.peers.len() >= self.max_connections {
            return false;
        }
        self.peers.insert(
            peer_id,
            PeerInfo {
                direction,
                connections: 1,
                agent_version: None,
                connected_at: Instant::now(),
            },
        );
        true
    }

    /// Record a closed connection. Returns the peer's info if it was the
    /// peer's last connection.
    pub fn remove_connection(&mut self, peer_id: &PeerId) -> Option<PeerInfo> {
        let info = self.peers.get_mut(peer_id)?;
        info.connections = info.connections.saturating_sub(1);
        if info.connections == 0 {
            return self.peers.remove(peer_id);
        }
        None
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// The configured peer limit.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Set the agent version for a peer (usually from identify).
    pub fn set_agent_version(&mut self, peer_id: &PeerId, agent: String) {
        if let Some(info) = self.peers.get_mut(peer_id) {
            info.agent_version = Some(agent);
        }
    }
}

/// Addresses learned for peers, used to dial by peer ID alone.
#[derive(Default)]
pub struct AddressBook {
    addrs: HashMap<PeerId, Vec<Multiaddr>>,
}

impl AddressBook {
    pub fn add(&mut self, peer_id: PeerId, addr: Multiaddr) {
        let entry = self.addrs.entry(peer_id).or_default();
        if !entry.contains(&addr) {
            entry.push(addr);
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> &[Multiaddr] {
        self.addrs.get(peer_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
