use thiserror::Error;

/// Errors that can occur in the relay layer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A general network-level error.
    #[error("network error: {reason}")]
    NetworkError { reason: String },

    /// Failed to encode or decode a frame.
    #[error("codec error: {reason}")]
    CodecError { reason: String },

    /// Frame was sent for a different network.
    #[error("bad network magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    /// Payload does not match the checksum in the frame header.
    #[error("checksum mismatch for '{command}' frame")]
    ChecksumMismatch { command: String },

    /// Command field is not a valid name.
    #[error("invalid command in frame header: {reason}")]
    InvalidCommand { reason: String },

    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Failed to establish or maintain a connection.
    #[error("connection error: {reason}")]
    ConnectionError { reason: String },

    /// Failed to open an application stream.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// Rendezvous lookup or advertisement failed.
    #[error("discovery error: {reason}")]
    DiscoveryError { reason: String },

    /// Joining or subscribing to a gossip topic failed.
    #[error("topic join failed for '{topic}': {reason}")]
    TopicJoin { topic: String, reason: String },

    /// Publishing to a gossip topic failed.
    #[error("publish to '{topic}' failed: {reason}")]
    PublishError { topic: String, reason: String },

    /// The network service is no longer running.
    #[error("network service has shut down")]
    Shutdown,

    /// Underlying I/O failure on a stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error came from a malformed frame rather than the transport.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            RelayError::CodecError { .. }
                | RelayError::BadMagic { .. }
                | RelayError::ChecksumMismatch { .. }
                | RelayError::InvalidCommand { .. }
                | RelayError::MessageTooLarge { .. }
        )
    }
}
