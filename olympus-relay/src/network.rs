//! Collaborator interfaces the relay core is written against.
//!
//! The libp2p backend in [`crate::service`] implements all of them through a
//! single cloneable handle; tests substitute in-memory fakes.

use async_trait::async_trait;
use futures::io::AsyncRead;
use futures::stream::BoxStream;
use libp2p::{Multiaddr, PeerId};
use std::fmt;

use crate::error::RelayError;

/// A peer found under a rendezvous string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl PeerDescriptor {
    pub fn new(peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self { peer_id, addrs }
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: [", self.peer_id)?;
        for (i, addr) in self.addrs.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", addr)?;
        }
        f.write_str("]}")
    }
}

/// Whether a live connection exists to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectedness {
    NotConnected,
    Connected,
}

/// Rendezvous-based peer discovery.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Start a lookup for peers advertised under `rendezvous`.
    ///
    /// The returned stream ending means the lookup closed normally; an `Err`
    /// means the lookup could not be issued at all.
    async fn find_peers(
        &self,
        rendezvous: &str,
    ) -> Result<BoxStream<'static, PeerDescriptor>, RelayError>;

    /// Announce this node under `rendezvous`. Re-announcement is the
    /// implementation's concern.
    async fn advertise(&self, rendezvous: &str) -> Result<(), RelayError>;

    /// Join the discovery overlay.
    async fn bootstrap(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

/// A joined publish/subscribe topic.
#[async_trait]
pub trait Topic: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Publish `data` to the topic's subscribers.
    async fn publish(&self, data: Vec<u8>) -> Result<(), RelayError>;

    /// Retransmit messages received on this topic to our own peers.
    async fn relay(&self) -> Result<(), RelayError>;
}

/// Topic-based publish/subscribe.
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    type Topic: Topic;

    async fn join(&self, topic: &str) -> Result<Self::Topic, RelayError>;
}

/// Connections and streams to individual peers.
#[async_trait]
pub trait Host: Send + Sync + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    fn local_peer_id(&self) -> PeerId;

    async fn connectedness(&self, peer: &PeerId) -> Result<Connectedness, RelayError>;

    /// Dial the peer. Resolves once the connection is established or failed.
    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), RelayError>;

    async fn new_stream(&self, peer: PeerId, protocol: &str) -> Result<Self::Stream, RelayError>;

    /// Inbound streams other peers open on `protocol`.
    fn accept(
        &self,
        protocol: &str,
    ) -> Result<BoxStream<'static, (PeerId, Self::Stream)>, RelayError>;
}

/// Everything the relayer needs from the network, behind one cloneable handle.
pub trait Network: Discovery + PubSub + Host + Clone {}

impl<T> Network for T where T: Discovery + PubSub + Host + Clone {}
