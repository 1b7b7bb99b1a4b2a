use libp2p::kad::RecordKey;
use libp2p::StreamProtocol;
use olympus_types::constants::{RENDEZVOUS_NAMESPACE, SYNC_PROTOCOL_ID};

use crate::error::RelayError;

/// The stream protocol framed messages are relayed over.
pub const SYNC_PROTOCOL: StreamProtocol = StreamProtocol::new(SYNC_PROTOCOL_ID);

/// DHT key under which peers advertising `rendezvous` are stored as providers.
///
/// Every node hashes the identical namespaced string, so advertisement and
/// lookup always land on the same key.
pub fn rendezvous_key(rendezvous: &str) -> RecordKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(RENDEZVOUS_NAMESPACE.as_bytes());
    hasher.update(rendezvous.as_bytes());
    RecordKey::new(hasher.finalize().as_bytes())
}

/// Parse a protocol name into a `StreamProtocol`.
pub fn stream_protocol(name: &str) -> Result<StreamProtocol, RelayError> {
    StreamProtocol::try_from_owned(name.to_string()).map_err(|e| RelayError::StreamError {
        reason: format!("invalid protocol '{}': {:?}", name, e),
    })
}
