//! Transport lifecycle callbacks and the notifier that turns outbound
//! connections into relayed sync streams.

use std::sync::Arc;

use libp2p::{Multiaddr, PeerId};
use olympus_types::constants::SYNC_PROTOCOL_ID;
use tracing::{debug, error, info, trace};

use crate::network::Network;
use crate::receiver::StreamReceiver;
use crate::tasks::TaskExecutor;

/// Which side opened a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Observer of transport events, invoked from the network event loop.
///
/// Implementations must return quickly; anything that waits goes into a
/// spawned task.
pub trait ConnectionNotifier: Send + Sync + 'static {
    type Stream: Send + 'static;

    fn on_listen(&self, _addr: &Multiaddr) {}

    fn on_listen_close(&self, _addr: &Multiaddr) {}

    fn on_connected(&self, _peer: PeerId, _direction: Direction) {}

    fn on_disconnected(&self, _peer: PeerId) {}

    fn on_stream_opened(&self, _peer: PeerId, _stream: Self::Stream) {}

    fn on_stream_closed(&self, _peer: PeerId) {}
}

/// Opens a sync stream on every outbound connection and runs one receiver
/// per open stream.
pub struct SyncNotifier<N: Network> {
    inner: Arc<Inner<N>>,
}

struct Inner<N: Network> {
    network: N,
    receiver: StreamReceiver<N>,
    executor: TaskExecutor,
}

impl<N: Network> Clone for SyncNotifier<N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<N: Network> SyncNotifier<N> {
    pub fn new(network: N, receiver: StreamReceiver<N>, executor: TaskExecutor) -> Self {
        Self {
            inner: Arc::new(Inner {
                network,
                receiver,
                executor,
            }),
        }
    }
}

impl<N: Network> ConnectionNotifier for SyncNotifier<N> {
    type Stream = N::Stream;

    fn on_listen(&self, addr: &Multiaddr) {
        debug!(%addr, "listening");
    }

    fn on_listen_close(&self, addr: &Multiaddr) {
        debug!(%addr, "stopped listening");
    }

    fn on_connected(&self, peer: PeerId, direction: Direction) {
        if direction == Direction::Inbound {
            trace!(%peer, "inbound connection, waiting for the peer to open a stream");
            return;
        }

        let notifier = self.clone();
        let shutdown = self.inner.executor.shutdown();
        self.inner.executor.spawn("open-sync-stream", async move {
            let opened = tokio::select! {
                _ = shutdown.cancelled() => return,
                opened = notifier.inner.network.new_stream(peer, SYNC_PROTOCOL_ID) => opened,
            };
            match opened {
                Ok(stream) => notifier.on_stream_opened(peer, stream),
                Err(e) => error!(%peer, error = %e, "unable to open sync stream"),
            }
        });
    }

    fn on_disconnected(&self, peer: PeerId) {
        debug!(%peer, "peer disconnected");
    }

    fn on_stream_opened(&self, peer: PeerId, stream: Self::Stream) {
        info!(%peer, "sync stream opened");
        let notifier = self.clone();
        let shutdown = self.inner.executor.shutdown();
        self.inner.executor.spawn("stream-receiver", async move {
            notifier.inner.receiver.run(peer, stream, shutdown).await;
            notifier.on_stream_closed(peer);
        });
    }

    fn on_stream_closed(&self, peer: PeerId) {
        debug!(%peer, "sync stream closed");
    }
}
