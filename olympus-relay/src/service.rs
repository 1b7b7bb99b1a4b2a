//! The libp2p backend: a swarm event loop driven through a command channel,
//! and a cloneable handle implementing the collaborator traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc as stream_mpsc;
use futures::stream::BoxStream;
use futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic};
use libp2p::identity::Keypair;
use libp2p::kad::{self, GetProvidersOk, QueryId, QueryResult, RecordKey};
use libp2p::swarm::dial_opts::{DialOpts, PeerCondition};
use libp2p::swarm::{ConnectionId, SwarmEvent};
use libp2p::{PeerId, Swarm, SwarmBuilder};
use olympus_types::ChainParams;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::behaviour::{build_behaviour, RelayerBehaviour, RelayerBehaviourEvent};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::network::{Connectedness, Discovery, Host, PeerDescriptor, PubSub, Topic};
use crate::notifier::{ConnectionNotifier, Direction};
use crate::peer_manager::{AddressBook, PeerManager};
use crate::protocol::{rendezvous_key, stream_protocol};
use crate::tasks::Shutdown;

/// Capacity of the handle-to-service command channel.
const COMMAND_CHANNEL_SIZE: usize = 1024;

type Reply<T> = oneshot::Sender<Result<T, RelayError>>;

/// Notifier shape the service drives.
pub type DynNotifier = Arc<dyn ConnectionNotifier<Stream = libp2p::Stream>>;

/// Requests from a [`NetworkHandle`] to the swarm task.
#[derive(Debug)]
enum NetworkCommand {
    Dial {
        peer: PeerDescriptor,
        reply: Reply<()>,
    },
    IsConnected {
        peer: PeerId,
        reply: oneshot::Sender<bool>,
    },
    FindProviders {
        key: RecordKey,
        found: stream_mpsc::UnboundedSender<PeerDescriptor>,
        reply: Reply<()>,
    },
    StartProviding {
        key: RecordKey,
        reply: Reply<()>,
    },
    Bootstrap {
        reply: Reply<()>,
    },
    Subscribe {
        topic: IdentTopic,
        reply: Reply<()>,
    },
    Publish {
        topic: IdentTopic,
        data: Vec<u8>,
        reply: Reply<()>,
    },
}

/// Owns the swarm. Consumed by [`NetworkService::run`].
pub struct NetworkService {
    swarm: Swarm<RelayerBehaviour>,
    commands: mpsc::Receiver<NetworkCommand>,
    peer_manager: PeerManager,
    address_book: AddressBook,
    pending_dials: HashMap<ConnectionId, (PeerId, Reply<()>)>,
    pending_lookups: HashMap<QueryId, stream_mpsc::UnboundedSender<PeerDescriptor>>,
}

impl NetworkService {
    /// Build the swarm and start listening on every configured address.
    pub fn new(
        keypair: Keypair,
        params: &'static ChainParams,
        config: &RelayConfig,
    ) -> Result<(Self, NetworkHandle), RelayError> {
        let idle_timeout = config.idle_timeout;
        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                libp2p::tcp::Config::default(),
                libp2p::noise::Config::new,
                libp2p::yamux::Config::default,
            )
            .map_err(|e| RelayError::NetworkError {
                reason: format!("tcp transport: {}", e),
            })?
            .with_dns()
            .map_err(|e| RelayError::NetworkError {
                reason: format!("dns transport: {}", e),
            })?
            .with_behaviour(|key| build_behaviour(key, params))
            .map_err(|e| RelayError::NetworkError {
                reason: format!("behaviour: {}", e),
            })?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle_timeout))
            .build();

        for addr in &config.listen_addrs {
            swarm
                .listen_on(addr.clone())
                .map_err(|e| RelayError::NetworkError {
                    reason: format!("listen on {}: {}", addr, e),
                })?;
        }

        let local_peer_id = *swarm.local_peer_id();
        let control = swarm.behaviour().stream.new_control();
        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        info!(
            peer_id = %local_peer_id,
            network = params.name,
            "network service created"
        );

        let service = Self {
            swarm,
            commands,
            peer_manager: PeerManager::new(config.max_connections),
            address_book: AddressBook::default(),
            pending_dials: HashMap::new(),
            pending_lookups: HashMap::new(),
        };
        let handle = NetworkHandle {
            local_peer_id,
            commands: command_tx,
            control,
        };
        Ok((service, handle))
    }

    /// Get the local peer ID.
    pub fn local_peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    /// Drive the swarm until shutdown. Transport events are reported to
    /// `notifier` synchronously from this loop.
    pub async fn run(mut self, notifier: DynNotifier, shutdown: Shutdown) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("network service stopping");
                    break;
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event, notifier.as_ref());
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all network handles dropped");
                        break;
                    }
                },
            }
        }
        // Dropping pending senders closes every open lookup stream.
        self.pending_lookups.clear();
        for (_, (_, reply)) in self.pending_dials.drain() {
            let _ = reply.send(Err(RelayError::Shutdown));
        }
    }

    fn handle_command(&mut self, command: NetworkCommand) {
        match command {
            NetworkCommand::Dial { peer, reply } => self.dial(peer, reply),
            NetworkCommand::IsConnected { peer, reply } => {
                let _ = reply.send(self.swarm.is_connected(&peer));
            }
            NetworkCommand::FindProviders { key, found, reply } => {
                let known: usize = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .kbuckets()
                    .map(|bucket| bucket.num_entries())
                    .sum();
                if known == 0 {
                    // Nobody to ask yet. `found` is dropped here, so the
                    // caller sees a lookup that closed with no results.
                    debug!("routing table empty, provider lookup closed");
                    let _ = reply.send(Ok(()));
                    return;
                }
                let id = self.swarm.behaviour_mut().kademlia.get_providers(key);
                self.pending_lookups.insert(id, found);
                let _ = reply.send(Ok(()));
            }
            NetworkCommand::StartProviding { key, reply } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .start_providing(key)
                    .map(|_| ())
                    .map_err(|e| RelayError::DiscoveryError {
                        reason: format!("provide: {}", e),
                    });
                let _ = reply.send(result);
            }
            NetworkCommand::Bootstrap { reply } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .bootstrap()
                    .map(|_| ())
                    .map_err(|e| RelayError::DiscoveryError {
                        reason: format!("bootstrap: {}", e),
                    });
                let _ = reply.send(result);
            }
            NetworkCommand::Subscribe { topic, reply } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .subscribe(&topic)
                    .map(|_| ())
                    .map_err(|e| RelayError::TopicJoin {
                        topic: topic.to_string(),
                        reason: e.to_string(),
                    });
                let _ = reply.send(result);
            }
            NetworkCommand::Publish { topic, data, reply } => {
                let name = topic.to_string();
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(topic, data)
                    .map(|_| ())
                    .map_err(|e| RelayError::PublishError {
                        topic: name,
                        reason: e.to_string(),
                    });
                let _ = reply.send(result);
            }
        }
    }

    fn dial(&mut self, peer: PeerDescriptor, reply: Reply<()>) {
        if self.swarm.is_connected(&peer.peer_id) {
            let _ = reply.send(Ok(()));
            return;
        }
        for addr in &peer.addrs {
            self.address_book.add(peer.peer_id, addr.clone());
            self.swarm
                .behaviour_mut()
                .kademlia
                .add_address(&peer.peer_id, addr.clone());
        }

        let mut addrs = peer.addrs;
        for known in self.address_book.get(&peer.peer_id) {
            if !addrs.contains(known) {
                addrs.push(known.clone());
            }
        }
        let opts = DialOpts::peer_id(peer.peer_id)
            .addresses(addrs)
            .extend_addresses_through_behaviour()
            .condition(PeerCondition::DisconnectedAndNotDialing)
            .build();
        let connection_id = opts.connection_id();

        match self.swarm.dial(opts) {
            Ok(()) => {
                trace!(peer_id = %peer.peer_id, "dialing");
                self.pending_dials
                    .insert(connection_id, (peer.peer_id, reply));
            }
            Err(e) => {
                let _ = reply.send(Err(RelayError::ConnectionError {
                    reason: format!("dial {}: {}", peer.peer_id, e),
                }));
            }
        }
    }

    fn handle_swarm_event(
        &mut self,
        event: SwarmEvent<RelayerBehaviourEvent>,
        notifier: &dyn ConnectionNotifier<Stream = libp2p::Stream>,
    ) {
        match event {
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                ..
            } => {
                let direction = if endpoint.is_dialer() {
                    Direction::Outbound
                } else {
                    Direction::Inbound
                };
                debug!(%peer_id, ?direction, remote = %endpoint.get_remote_address(), "connection established");

                if !self.peer_manager.add_connection(peer_id, direction) {
                    warn!(
                        %peer_id,
                        max = self.peer_manager.max_connections(),
                        "peer limit reached, closing connection"
                    );
                    self.swarm.close_connection(connection_id);
                    if let Some((_, reply)) = self.pending_dials.remove(&connection_id) {
                        let _ = reply.send(Err(RelayError::ConnectionError {
                            reason: "connection limit reached".to_string(),
                        }));
                    }
                    return;
                }

                if let Some((_, reply)) = self.pending_dials.remove(&connection_id) {
                    let _ = reply.send(Ok(()));
                }
                trace!(peers = self.peer_manager.peer_count(), "peer count");
                notifier.on_connected(peer_id, direction);
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
            } => {
                debug!(?peer_id, %error, "outgoing connection failed");
                if let Some((peer, reply)) = self.pending_dials.remove(&connection_id) {
                    let _ = reply.send(Err(RelayError::ConnectionError {
                        reason: format!("dial {}: {}", peer, error),
                    }));
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                debug!(%peer_id, ?cause, "connection closed");
                if let Some(info) = self.peer_manager.remove_connection(&peer_id) {
                    debug!(
                        %peer_id,
                        direction = ?info.direction,
                        agent = info.agent_version.as_deref().unwrap_or("unknown"),
                        connected_for = ?info.connected_at.elapsed(),
                        peers = self.peer_manager.peer_count(),
                        "peer disconnected"
                    );
                    notifier.on_disconnected(peer_id);
                }
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening on new address");
                notifier.on_listen(&address);
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                notifier.on_listen_close(&address);
            }
            SwarmEvent::ListenerClosed { addresses, reason, .. } => {
                warn!(?reason, "listener closed");
                for address in &addresses {
                    notifier.on_listen_close(address);
                }
            }
            other => {
                trace!(?other, "other swarm event");
            }
        }
    }

    fn handle_behaviour_event(&mut self, event: RelayerBehaviourEvent) {
        match event {
            RelayerBehaviourEvent::Kademlia(kad::Event::OutboundQueryProgressed {
                id,
                result,
                step,
                ..
            }) => self.handle_query_progress(id, result, step.last),
            RelayerBehaviourEvent::Kademlia(kad::Event::RoutingUpdated {
                peer, addresses, ..
            }) => {
                trace!(%peer, "routing table updated");
                for addr in addresses.iter() {
                    self.address_book.add(peer, addr.clone());
                }
            }
            RelayerBehaviourEvent::Identify(libp2p::identify::Event::Received {
                peer_id,
                info,
                ..
            }) => {
                debug!(
                    %peer_id,
                    protocol = %info.protocol_version,
                    agent = %info.agent_version,
                    "identified peer"
                );
                self.peer_manager
                    .set_agent_version(&peer_id, info.agent_version);
                for addr in info.listen_addrs {
                    self.address_book.add(peer_id, addr.clone());
                    self.swarm
                        .behaviour_mut()
                        .kademlia
                        .add_address(&peer_id, addr);
                }
            }
            RelayerBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            }) => {
                trace!(
                    %propagation_source,
                    topic = %message.topic,
                    size = message.data.len(),
                    "gossip message"
                );
            }
            _ => {}
        }
    }

    fn handle_query_progress(&mut self, id: QueryId, result: QueryResult, last: bool) {
        match result {
            QueryResult::GetProviders(Ok(GetProvidersOk::FoundProviders { providers, .. })) => {
                let mut receiver_gone = false;
                if let Some(found) = self.pending_lookups.get(&id) {
                    for peer in providers {
                        let addrs = self.address_book.get(&peer).to_vec();
                        if found.unbounded_send(PeerDescriptor::new(peer, addrs)).is_err() {
                            receiver_gone = true;
                            break;
                        }
                    }
                }
                if receiver_gone {
                    self.pending_lookups.remove(&id);
                    if let Some(mut query) = self.swarm.behaviour_mut().kademlia.query_mut(&id) {
                        query.finish();
                    }
                } else if last {
                    self.pending_lookups.remove(&id);
                }
            }
            QueryResult::GetProviders(Ok(GetProvidersOk::FinishedWithNoAdditionalRecord {
                ..
            })) => {
                self.pending_lookups.remove(&id);
            }
            QueryResult::GetProviders(Err(e)) => {
                debug!(error = %e, "provider lookup ended with error");
                self.pending_lookups.remove(&id);
            }
            QueryResult::StartProviding(Ok(_)) => {
                debug!("provider record published");
            }
            QueryResult::StartProviding(Err(e)) => {
                warn!(error = %e, "provider record publication failed");
            }
            QueryResult::Bootstrap(Ok(ok)) => {
                if last {
                    debug!(remaining = ok.num_remaining, "dht bootstrap finished");
                }
            }
            QueryResult::Bootstrap(Err(e)) => {
                warn!(error = %e, "dht bootstrap failed");
            }
            _ => {}
        }
    }
}

/// Cloneable handle to a running [`NetworkService`].
#[derive(Clone)]
pub struct NetworkHandle {
    local_peer_id: PeerId,
    commands: mpsc::Sender<NetworkCommand>,
    control: libp2p_stream::Control,
}

impl NetworkHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> NetworkCommand,
    ) -> Result<T, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| RelayError::Shutdown)?;
        rx.await.map_err(|_| RelayError::Shutdown)?
    }
}

#[async_trait]
impl Discovery for NetworkHandle {
    async fn find_peers(
        &self,
        rendezvous: &str,
    ) -> Result<BoxStream<'static, PeerDescriptor>, RelayError> {
        let (found, peers) = stream_mpsc::unbounded();
        let key = rendezvous_key(rendezvous);
        self.request(|reply| NetworkCommand::FindProviders { key, found, reply })
            .await?;
        Ok(peers.boxed())
    }

    async fn advertise(&self, rendezvous: &str) -> Result<(), RelayError> {
        let key = rendezvous_key(rendezvous);
        self.request(|reply| NetworkCommand::StartProviding { key, reply })
            .await
    }

    async fn bootstrap(&self) -> Result<(), RelayError> {
        self.request(|reply| NetworkCommand::Bootstrap { reply }).await
    }
}

/// A gossipsub topic joined through a [`NetworkHandle`].
pub struct GossipTopic {
    name: String,
    topic: IdentTopic,
    commands: mpsc::Sender<NetworkCommand>,
}

impl GossipTopic {
    async fn request(&self, make: impl FnOnce(Reply<()>) -> NetworkCommand) -> Result<(), RelayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| RelayError::Shutdown)?;
        rx.await.map_err(|_| RelayError::Shutdown)?
    }
}

#[async_trait]
impl Topic for GossipTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), RelayError> {
        let topic = self.topic.clone();
        self.request(|reply| NetworkCommand::Publish { topic, data, reply })
            .await
    }

    /// Gossipsub forwards everything on subscribed topics, so relaying is
    /// a subscription whose messages we ignore.
    async fn relay(&self) -> Result<(), RelayError> {
        let topic = self.topic.clone();
        self.request(|reply| NetworkCommand::Subscribe { topic, reply })
            .await
    }
}

#[async_trait]
impl PubSub for NetworkHandle {
    type Topic = GossipTopic;

    async fn join(&self, topic: &str) -> Result<GossipTopic, RelayError> {
        if topic.is_empty() {
            return Err(RelayError::TopicJoin {
                topic: String::new(),
                reason: "empty topic name".to_string(),
            });
        }
        if self.commands.is_closed() {
            return Err(RelayError::Shutdown);
        }
        Ok(GossipTopic {
            name: topic.to_string(),
            topic: IdentTopic::new(topic),
            commands: self.commands.clone(),
        })
    }
}

#[async_trait]
impl Host for NetworkHandle {
    type Stream = libp2p::Stream;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn connectedness(&self, peer: &PeerId) -> Result<Connectedness, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(NetworkCommand::IsConnected { peer: *peer, reply })
            .await
            .map_err(|_| RelayError::Shutdown)?;
        let connected = rx.await.map_err(|_| RelayError::Shutdown)?;
        Ok(if connected {
            Connectedness::Connected
        } else {
            Connectedness::NotConnected
        })
    }

    async fn connect(&self, peer: &PeerDescriptor) -> Result<(), RelayError> {
        let peer = peer.clone();
        self.request(|reply| NetworkCommand::Dial { peer, reply })
            .await
    }

    async fn new_stream(&self, peer: PeerId, protocol: &str) -> Result<libp2p::Stream, RelayError> {
        let protocol = stream_protocol(protocol)?;
        self.control
            .clone()
            .open_stream(peer, protocol)
            .await
            .map_err(|e| RelayError::StreamError {
                reason: format!("open stream to {}: {}", peer, e),
            })
    }

    fn accept(
        &self,
        protocol: &str,
    ) -> Result<BoxStream<'static, (PeerId, libp2p::Stream)>, RelayError> {
        let protocol = stream_protocol(protocol)?;
        let incoming = self
            .control
            .clone()
            .accept(protocol)
            .map_err(|e| RelayError::StreamError {
                reason: format!("accept: {}", e),
            })?;
        Ok(incoming.boxed())
    }
}
