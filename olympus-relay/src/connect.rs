use libp2p::PeerId;
use tracing::{debug, trace, warn};

use crate::network::{Connectedness, Host, PeerDescriptor};

/// Result of applying the connect policy to one discovered peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    SelfPeer,
    AlreadyConnected,
    Connected,
    Failed,
}

/// Decides whether a discovered peer is dialed, and dials it.
#[derive(Clone)]
pub struct PeerConnector<H> {
    host: H,
    local_peer_id: PeerId,
}

impl<H: Host> PeerConnector<H> {
    pub fn new(host: H) -> Self {
        let local_peer_id = host.local_peer_id();
        Self {
            host,
            local_peer_id,
        }
    }

    /// Skip ourselves and peers we are already connected to; dial the rest.
    /// Failures are logged; the peer may come back in a later lookup.
    pub async fn handle_peer(&self, peer: &PeerDescriptor) -> ConnectOutcome {
        if peer.peer_id == self.local_peer_id {
            trace!("discovered ourselves, skipping");
            return ConnectOutcome::SelfPeer;
        }

        match self.host.connectedness(&peer.peer_id).await {
            Ok(Connectedness::Connected) => {
                trace!(peer_id = %peer.peer_id, "already connected");
                return ConnectOutcome::AlreadyConnected;
            }
            Ok(Connectedness::NotConnected) => {}
            Err(e) => {
                warn!(peer_id = %peer.peer_id, error = %e, "could not query connectedness");
                return ConnectOutcome::Failed;
            }
        }

        debug!(peer = %peer, "peer found, connecting");
        match self.host.connect(peer).await {
            Ok(()) => {
                debug!(peer_id = %peer.peer_id, "connected to discovered peer");
                ConnectOutcome::Connected
            }
            Err(e) => {
                debug!(peer_id = %peer.peer_id, error = %e, "failed to connect to discovered peer");
                ConnectOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use async_trait::async_trait;
    use futures::io::Cursor;
    use futures::stream::BoxStream;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct FakeHost {
        local: PeerId,
        connected: Arc<Mutex<HashSet<PeerId>>>,
        dials: Arc<Mutex<Vec<PeerId>>>,
        refuse: bool,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                local: PeerId::random(),
                connected: Arc::default(),
                dials: Arc::default(),
                refuse: false,
            }
        }
    }

    #[async_trait]
    impl Host for FakeHost {
        type Stream = Cursor<Vec<u8>>;

        fn local_peer_id(&self) -> PeerId {
            self.local
        }

        async fn connectedness(&self, peer: &PeerId) -> Result<Connectedness, RelayError> {
            Ok(if self.connected.lock().unwrap().contains(peer) {
                Connectedness::Connected
            } else {
                Connectedness::NotConnected
            })
        }

        async fn connect(&self, peer: &PeerDescriptor) -> Result<(), RelayError> {
            self.dials.lock().unwrap().push(peer.peer_id);
            if self.refuse {
                return Err(RelayError::ConnectionError {
                    reason: "refused".to_string(),
                });
            }
            self.connected.lock().unwrap().insert(peer.peer_id);
            Ok(())
        }

        async fn new_stream(&self, _peer: PeerId, _protocol: &str) -> Result<Self::Stream, RelayError> {
            Ok(Cursor::new(Vec::new()))
        }

        fn accept(
            &self,
            _protocol: &str,
        ) -> Result<BoxStream<'static, (PeerId, Self::Stream)>, RelayError> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[tokio::test]
    async fn test_self_is_never_dialed() {
        let host = FakeHost::new();
        let connector = PeerConnector::new(host.clone());
        let me = PeerDescriptor::new(host.local, vec![]);

        for _ in 0..3 {
            assert_eq!(connector.handle_peer(&me).await, ConnectOutcome::SelfPeer);
        }
        assert!(host.dials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connected_peer_is_not_redialed() {
        let host = FakeHost::new();
        let connector = PeerConnector::new(host.clone());
        let peer = PeerDescriptor::new(PeerId::random(), vec![]);

        assert_eq!(connector.handle_peer(&peer).await, ConnectOutcome::Connected);
        assert_eq!(
            connector.handle_peer(&peer).await,
            ConnectOutcome::AlreadyConnected
        );
        assert_eq!(*host.dials.lock().unwrap(), vec![peer.peer_id]);
    }

    #[tokio::test]
    async fn test_failed_dial_is_retried_on_next_discovery() {
        let host = FakeHost {
            refuse: true,
            ..FakeHost::new()
        };
        let connector = PeerConnector::new(host.clone());
        let peer = PeerDescriptor::new(PeerId::random(), vec![]);

        assert_eq!(connector.handle_peer(&peer).await, ConnectOutcome::Failed);
        assert_eq!(connector.handle_peer(&peer).await, ConnectOutcome::Failed);
        assert_eq!(host.dials.lock().unwrap().len(), 2);
    }
}
