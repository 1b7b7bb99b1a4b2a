//! Shared type definitions for the Olympus relayer: chain parameters, the
//! relayable command set, and the decoded protocol message.

pub mod command;
pub mod constants;
pub mod error;
pub mod message;
pub mod params;

pub use command::Command;
pub use error::TypesError;
pub use message::ProtocolMessage;
pub use params::{ChainParams, NetworkId};
