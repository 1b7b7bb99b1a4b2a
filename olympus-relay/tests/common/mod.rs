//! In-memory network shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::io::{AsyncRead, Cursor};
use futures::stream::BoxStream;
use futures::StreamExt;
use libp2p::PeerId;
use olympus_relay::codec::encode_message;
use olympus_relay::error::RelayError;
use olympus_relay::network::{Connectedness, Discovery, Host, PeerDescriptor, PubSub, Topic};
use olympus_relay::notifier::{ConnectionNotifier, Direction};
use olympus_types::ProtocolMessage;

/// A stream that either replays fixed bytes or never yields.
pub enum FakeStream {
    Data(Cursor<Vec<u8>>),
    Stalled,
}

impl AsyncRead for FakeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            FakeStream::Data(cursor) => Pin::new(cursor).poll_read(cx, buf),
            FakeStream::Stalled => Poll::Pending,
        }
    }
}

#[derive(Default)]
pub struct State {
    pub advertised: Vec<String>,
    pub lookups: HashMap<String, usize>,
    pub providers: HashMap<String, Vec<PeerDescriptor>>,
    pub failing_lookups: HashSet<String>,
    pub failing_join: Option<String>,
    pub connected: HashSet<PeerId>,
    pub dials: Vec<PeerId>,
    pub streams_opened: Vec<(PeerId, String)>,
    pub stream_bytes: HashMap<PeerId, Vec<u8>>,
    pub stalled_peers: HashSet<PeerId>,
    pub failing_streams: HashSet<PeerId>,
    pub joins: Vec<String>,
    pub relays: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
}

type Notifier = Arc<dyn ConnectionNotifier<Stream = FakeStream>>;

/// Implements every collaborator trait against shared in-memory state.
#[derive(Clone)]
pub struct FakeNetwork {
    pub local: PeerId,
    pub state: Arc<Mutex<State>>,
    notifier: Arc<Mutex<Option<Notifier>>>,
    inbound_tx: mpsc::UnboundedSender<(PeerId, FakeStream)>,
    inbound_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<(PeerId, FakeStream)>>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        Self {
            local: PeerId::random(),
            state: Arc::default(),
            notifier: Arc::default(),
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(Some(inbound_rx))),
        }
    }

    /// Report connection events to `notifier`, as the real service does.
    pub fn attach<C>(&self, notifier: C)
    where
        C: ConnectionNotifier<Stream = FakeStream>,
    {
        *self.notifier.lock().unwrap() = Some(Arc::new(notifier));
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Advertise `peer` under `rendezvous` with a sync stream carrying `bytes`.
    pub fn add_provider(&self, rendezvous: &str, peer: PeerId, bytes: Vec<u8>) {
        let mut state = self.state();
        state
            .providers
            .entry(rendezvous.to_string())
            .or_default()
            .push(PeerDescriptor::new(peer, vec![]));
        state.stream_bytes.insert(peer, bytes);
    }

    /// Simulate a peer opening a sync stream to us.
    pub fn push_inbound(&self, peer: PeerId, bytes: Vec<u8>) {
        let _ = self
            .inbound_tx
            .unbounded_send((peer, FakeStream::Data(Cursor::new(bytes))));
    }

    pub fn lookups(&self, rendezvous: &str) -> usize {
        *self.state().lookups.get(rendezvous).unwrap_or(&0)
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state().published.clone()
    }
}

pub fn frames(magic: u32, messages: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (command, payload) in messages {
        let msg = ProtocolMessage::new(*command, payload.to_vec()).unwrap();
        out.extend(encode_message(&msg, magic).unwrap());
    }
    out
}

#[async_trait]
impl Discovery for FakeNetwork {
    async fn find_peers(
        &self,
        rendezvous: &str,
    ) -> Result<BoxStream<'static, PeerDescriptor>, RelayError> {
        let mut state = self.state();
        *state.lookups.entry(rendezvous.to_string()).or_default() += 1;
        if state.failing_lookups.contains(rendezvous) {
            return Err(RelayError::DiscoveryError {
                reason: "lookup refused".to_string(),
            });
        }
        let peers = state.providers.get(rendezvous).cloned().unwrap_or_default();
        Ok(futures::stream::iter(peers).boxed())
    }

    async fn advertise(&self, rendezvous: &str) -> Result<(), RelayError> {
        self.state().advertised.push(rendezvous.to_string());
        Ok(())
    }
}

pub struct FakeTopic {
    name: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Topic for FakeTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), RelayError> {
        self.state
            .lock()
            .unwrap()
            .published
            .push((self.name.clone(), data));
        Ok(())
    }

    async fn relay(&self) -> Result<(), RelayError> {
        self.state.lock().unwrap().relays.push(self.name.clone());
        Ok(())
    }
}

#[async_trait]
impl PubSub for FakeNetwork {
    type Topic = FakeTopic;

    async fn join(&self, topic: &str) -> Result<FakeTopic, RelayError> {
        let mut state = self.state();
        if state.failing_join.as_deref() == Some(topic) {
            return Err(RelayError::TopicJoin {
                topic: topic.to_string(),
                reason: "refused".to_string(),
            });
        }
        state.joins.push(topic.to_string());
        Ok(FakeTopic {
            name: topic.to_string(),
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl Host for FakeNetwork {
    type Stream = FakeStream;

    fn local_peer_id(&self) -> PeerId {
        self.local
    }

    async fn connectedness(&self, peer: &PeerId) -> Result<Connectedness, RelayError> {
        Ok(if self.state().connected.contains(peer) {
            Connectedness::Connected
        } else {
            Connectedness::NotConnected
        })
    }

    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), RelayError> {
        {
            let mut state = self.state();
            state.dials.push(peer.peer_id);
            state.connected.insert(peer.peer_id);
        }
        let notifier = self.notifier.lock().unwrap().clone();
        if let Some(notifier) = notifier {
            notifier.on_connected(peer.peer_id, Direction::Outbound);
        }
        Ok(())
    }

    async fn new_stream(&self, peer: PeerId, protocol: &str) -> Result<FakeStream, RelayError> {
        let mut state = self.state();
        state.streams_opened.push((peer, protocol.to_string()));
        if state.failing_streams.contains(&peer) {
            return Err(RelayError::StreamError {
                reason: format!("{} does not speak {}", peer, protocol),
            });
        }
        if state.stalled_peers.contains(&peer) {
            return Ok(FakeStream::Stalled);
        }
        let bytes = state.stream_bytes.remove(&peer).unwrap_or_default();
        Ok(FakeStream::Data(Cursor::new(bytes)))
    }

    fn accept(
        &self,
        _protocol: &str,
    ) -> Result<BoxStream<'static, (PeerId, FakeStream)>, RelayError> {
        self.inbound_rx
            .lock()
            .unwrap()
            .take()
            .map(|rx| rx.boxed())
            .ok_or_else(|| RelayError::StreamError {
                reason: "protocol already registered".to_string(),
            })
    }
}
