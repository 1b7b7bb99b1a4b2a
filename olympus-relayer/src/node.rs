use std::sync::Arc;

use libp2p::PeerId;
use olympus_relay::service::DynNotifier;
use olympus_relay::tasks::{shutdown_channel, ShutdownTrigger};
use olympus_relay::{NetworkHandle, NetworkService, Relayer};

use crate::config::RelayerConfig;
use crate::error::NodeError;
use crate::keys;

/// A running relayer: the network service plus the relay bridge on top.
pub struct RelayerNode {
    peer_id: PeerId,
    relayer: Relayer<NetworkHandle>,
    trigger: ShutdownTrigger,
}

impl RelayerNode {
    /// Load the node key, start the network service and bring the relayer
    /// up. Any error here happens before discovery or relaying begins.
    pub async fn start(config: &RelayerConfig) -> Result<Self, NodeError> {
        let params = config.network.params();
        let relay_config = config.relay_config()?;
        let keypair = keys::load_or_generate(config.datadir())?;

        let (service, handle) = NetworkService::new(keypair, params, &relay_config)?;
        let peer_id = service.local_peer_id();

        let (trigger, shutdown) = shutdown_channel();
        let relayer = Relayer::new(handle, params, relay_config, shutdown.clone());

        let notifier: DynNotifier = Arc::new(relayer.notifier());
        relayer
            .executor()
            .spawn("network-service", service.run(notifier, shutdown));

        if let Err(e) = relayer.start().await {
            trigger.cancel();
            relayer.join().await;
            return Err(e.into());
        }

        tracing::info!(%peer_id, network = params.name, "relayer started");
        Ok(Self {
            peer_id,
            relayer,
            trigger,
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Run until Ctrl-C, then shut down.
    pub async fn run(self) -> Result<(), NodeError> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received shutdown signal");
        self.shutdown().await;
        Ok(())
    }

    /// Cancel every task and wait for them. Returns the number of tasks that
    /// had to be aborted.
    pub async fn shutdown(self) -> usize {
        tracing::info!("Shutting down relayer...");
        self.trigger.cancel();
        let aborted = self.relayer.join().await;
        tracing::info!(aborted, "Relayer shutdown complete");
        aborted
    }
}
