use std::path::Path;

use libp2p::identity::Keypair;

use crate::error::NodeError;

/// File name of the persisted node key inside the data directory.
pub const NODE_KEY_FILE: &str = "node_key.dat";

/// Load the node keypair from `datadir`, generating and saving a new ed25519
/// key if the file is missing or cannot be decoded.
pub fn load_or_generate(datadir: &Path) -> Result<Keypair, NodeError> {
    let path = datadir.join(NODE_KEY_FILE);
    match std::fs::read(&path) {
        Ok(bytes) => match Keypair::from_protobuf_encoding(&bytes) {
            Ok(keypair) => {
                tracing::debug!(path = %path.display(), "loaded node key");
                return Ok(keypair);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "node key unreadable, generating a new one");
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no node key found, generating a new one");
        }
        Err(e) => return Err(e.into()),
    }

    let keypair = Keypair::generate_ed25519();
    save(datadir, &keypair)?;
    Ok(keypair)
}

/// Write `keypair` to `<datadir>/node_key.dat`, readable by the owner only.
pub fn save(datadir: &Path, keypair: &Keypair) -> Result<(), NodeError> {
    std::fs::create_dir_all(datadir)?;
    let bytes = keypair
        .to_protobuf_encoding()
        .map_err(|e| NodeError::KeyError {
            reason: format!("failed to encode node key: {}", e),
        })?;
    let path = datadir.join(NODE_KEY_FILE);
    std::fs::write(&path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
