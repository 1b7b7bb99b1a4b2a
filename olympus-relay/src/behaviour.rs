use libp2p::gossipsub;
use libp2p::identity::Keypair;
use libp2p::kad;
use libp2p::swarm::NetworkBehaviour;
use libp2p::StreamProtocol;
use olympus_types::constants::MAX_PAYLOAD_SIZE;
use olympus_types::ChainParams;
use std::time::Duration;

/// Combined network behaviour for an Olympus relayer.
#[derive(NetworkBehaviour)]
pub struct RelayerBehaviour {
    /// Gossipsub for the per-command relay topics.
    pub gossipsub: gossipsub::Behaviour,
    /// Kademlia for rendezvous provider records.
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    /// Identify protocol for peer identification and address exchange.
    pub identify: libp2p::identify::Behaviour,
    /// Raw application streams for the sync protocol.
    pub stream: libp2p_stream::Behaviour,
}

/// Build a RelayerBehaviour for the network described by `params`.
///
/// Returns `Result<RelayerBehaviour, Box<dyn Error + Send + Sync>>` to conform
/// to the `TryIntoBehaviour` trait expected by `SwarmBuilder::with_behaviour`.
pub fn build_behaviour(
    keypair: &Keypair,
    params: &ChainParams,
) -> Result<RelayerBehaviour, Box<dyn std::error::Error + Send + Sync>> {
    let local_peer_id = keypair.public().to_peer_id();

    // --- Gossipsub ---
    let message_id_fn = |message: &gossipsub::Message| {
        // Deduplicate per topic on content hash.
        let mut hasher = blake3::Hasher::new();
        hasher.update(message.topic.as_str().as_bytes());
        hasher.update(&message.data);
        gossipsub::MessageId::from(hasher.finalize().as_bytes().to_vec())
    };

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(1))
        .validation_mode(gossipsub::ValidationMode::Strict)
        .max_transmit_size(MAX_PAYLOAD_SIZE + 64 * 1024)
        .message_id_fn(message_id_fn)
        .build()
        .map_err(|e| format!("gossipsub config: {}", e))?;

    let gossipsub = gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        gossipsub_config,
    )
    .map_err(|e| format!("gossipsub behaviour: {}", e))?;

    // --- Kademlia ---
    let kad_protocol = StreamProtocol::try_from_owned(params.kad_protocol())
        .map_err(|e| format!("invalid protocol: {:?}", e))?;
    let kad_config = kad::Config::new(kad_protocol);
    let mut kademlia = kad::Behaviour::with_config(
        local_peer_id,
        kad::store::MemoryStore::new(local_peer_id),
        kad_config,
    );
    kademlia.set_mode(Some(kad::Mode::Server));

    // --- Identify ---
    let identify = libp2p::identify::Behaviour::new(
        libp2p::identify::Config::new(params.identify_protocol(), keypair.public())
            .with_agent_version(format!("olympus-relayer/{}", env!("CARGO_PKG_VERSION"))),
    );

    Ok(RelayerBehaviour {
        gossipsub,
        kademlia,
        identify,
        stream: libp2p_stream::Behaviour::new(),
    })
}
