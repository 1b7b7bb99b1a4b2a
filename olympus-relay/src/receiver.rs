use std::sync::Arc;

use futures::io::AsyncRead;
use libp2p::PeerId;
use tracing::{debug, info, trace, warn};

use crate::codec;
use crate::error::RelayError;
use crate::network::PubSub;
use crate::tasks::Shutdown;
use crate::topics::TopicRegistry;

/// Why a receive loop stopped.
#[derive(Debug)]
pub enum ReceiveExit {
    /// Shutdown was requested.
    Cancelled,
    /// The peer closed the stream between frames.
    Closed,
    /// A frame failed to decode or the stream errored.
    Failed(RelayError),
}

/// Summary of one finished receive loop.
#[derive(Debug)]
pub struct ReceiveReport {
    pub exit: ReceiveExit,
    pub frames: u64,
}

/// Reads framed messages from one stream and relays them in arrival order.
pub struct StreamReceiver<P: PubSub> {
    registry: Arc<TopicRegistry<P>>,
    net_magic: u32,
}

impl<P: PubSub> Clone for StreamReceiver<P> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            net_magic: self.net_magic,
        }
    }
}

impl<P: PubSub> StreamReceiver<P> {
    pub fn new(registry: Arc<TopicRegistry<P>>, net_magic: u32) -> Self {
        Self {
            registry,
            net_magic,
        }
    }

    /// Run until shutdown, end of stream, or the first bad frame.
    ///
    /// Errors end this stream only; they are reported, never propagated.
    pub async fn run<S>(&self, peer: PeerId, mut stream: S, shutdown: Shutdown) -> ReceiveReport
    where
        S: AsyncRead + Unpin,
    {
        info!(%peer, "handling messages from peer");
        let mut frames = 0u64;
        let exit = loop {
            if shutdown.is_cancelled() {
                break ReceiveExit::Cancelled;
            }

            let next = tokio::select! {
                _ = shutdown.cancelled() => break ReceiveExit::Cancelled,
                next = codec::read_message(&mut stream, self.net_magic) => next,
            };

            match next {
                Ok(Some(message)) => {
                    frames += 1;
                    trace!(%peer, command = %message.command, "processing message");
                    self.registry.relay(&message).await;
                }
                Ok(None) => break ReceiveExit::Closed,
                Err(e) => break ReceiveExit::Failed(e),
            }
        };

        match &exit {
            ReceiveExit::Cancelled => debug!(%peer, frames, "receive loop cancelled"),
            ReceiveExit::Closed => debug!(%peer, frames, "stream closed by peer"),
            ReceiveExit::Failed(e) if e.is_decode_error() => {
                warn!(%peer, frames, error = %e, "bad frame, dropping stream")
            }
            ReceiveExit::Failed(e) => warn!(%peer, frames, error = %e, "stream read failed"),
        }
        ReceiveReport { exit, frames }
    }
}
