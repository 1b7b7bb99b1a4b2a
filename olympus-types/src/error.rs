use thiserror::Error;

/// Errors produced while parsing shared types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("unknown network '{0}', expected 'testnet' or 'mainnet'")]
    UnknownNetwork(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("command name too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("command name is not printable ASCII")]
    CommandNotAscii,
}
