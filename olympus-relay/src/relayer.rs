use std::sync::Arc;

use futures::StreamExt;
use olympus_types::constants::SYNC_PROTOCOL_ID;
use olympus_types::ChainParams;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::connect::PeerConnector;
use crate::discovery::{advertise_all, parse_boot_nodes, run_rendezvous_loop, LoopExit};
use crate::error::RelayError;
use crate::network::Network;
use crate::notifier::{ConnectionNotifier, SyncNotifier};
use crate::receiver::StreamReceiver;
use crate::tasks::{Shutdown, TaskExecutor};
use crate::topics::TopicRegistry;

/// The discovery-to-relay bridge, wired against one [`Network`].
pub struct Relayer<N: Network> {
    network: N,
    config: RelayConfig,
    registry: Arc<TopicRegistry<N>>,
    executor: TaskExecutor,
    connector: PeerConnector<N>,
    notifier: SyncNotifier<N>,
}

impl<N: Network> Relayer<N> {
    pub fn new(network: N, params: &ChainParams, config: RelayConfig, shutdown: Shutdown) -> Self {
        let executor = TaskExecutor::new(shutdown);
        let registry = Arc::new(TopicRegistry::new(network.clone()));
        let receiver = StreamReceiver::new(registry.clone(), params.net_magic);
        let notifier = SyncNotifier::new(network.clone(), receiver, executor.clone());
        let connector = PeerConnector::new(network.clone());
        Self {
            network,
            config,
            registry,
            executor,
            connector,
            notifier,
        }
    }

    /// The notifier to install in the network service. There is exactly one
    /// per relayer; clones share it.
    pub fn notifier(&self) -> SyncNotifier<N> {
        self.notifier.clone()
    }

    pub fn registry(&self) -> &Arc<TopicRegistry<N>> {
        &self.registry
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Bring the relayer up.
    ///
    /// Topic subscription finishes before any stream is accepted, and its
    /// failure is returned. Everything after that runs in spawned tasks or
    /// only logs.
    pub async fn start(&self) -> Result<(), RelayError> {
        self.registry.subscribe_all().await?;
        info!(topics = self.registry.topic_count().await, "subscribed to relay topics");

        self.spawn_acceptor()?;
        self.bootstrap().await;

        let advertised = advertise_all(&self.network, &self.config.rendezvous_strings).await;
        debug!(advertised, "advertised rendezvous strings");

        for rendezvous in &self.config.rendezvous_strings {
            let discovery = self.network.clone();
            let connector = self.connector.clone();
            let rendezvous = rendezvous.clone();
            let settings = self.config.discovery_settings();
            let shutdown = self.executor.shutdown();
            self.executor.spawn("rendezvous-discovery", async move {
                let name = rendezvous.clone();
                match run_rendezvous_loop(discovery, connector, rendezvous, settings, shutdown).await {
                    LoopExit::Cancelled => debug!(rendezvous = %name, "discovery loop cancelled"),
                    LoopExit::Failed(_) => debug!(rendezvous = %name, "discovery loop stopped"),
                }
            });
        }
        Ok(())
    }

    /// Wait for every spawned task, aborting those still running after the
    /// configured grace period.
    pub async fn join(&self) -> usize {
        self.executor.join(self.config.shutdown_grace).await
    }

    fn spawn_acceptor(&self) -> Result<(), RelayError> {
        let mut incoming = self.network.accept(SYNC_PROTOCOL_ID)?;
        let notifier = self.notifier.clone();
        let shutdown = self.executor.shutdown();
        self.executor.spawn("sync-acceptor", async move {
            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = incoming.next() => next,
                };
                match next {
                    Some((peer, stream)) => notifier.on_stream_opened(peer, stream),
                    None => break,
                }
            }
        });
        Ok(())
    }

    /// Dial the configured bootstrap relayers and join the DHT.
    async fn bootstrap(&self) {
        let boot_nodes = parse_boot_nodes(&self.config.boot_nodes, &self.network.local_peer_id());
        for peer in &boot_nodes {
            self.connector.handle_peer(peer).await;
        }
        if let Err(e) = self.network.bootstrap().await {
            warn!(error = %e, boot_nodes = boot_nodes.len(), "dht bootstrap failed");
        }
    }
}
