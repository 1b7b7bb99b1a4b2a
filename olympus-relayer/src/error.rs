use thiserror::Error;

/// Errors that can occur in the relayer binary.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NodeError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("key error: {reason}")]
    KeyError { reason: String },

    #[error("logging error: {reason}")]
    LoggingError { reason: String },

    #[error("relay error: {0}")]
    RelayError(#[from] olympus_relay::RelayError),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
