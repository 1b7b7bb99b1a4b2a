//! Discovery-to-relay bridge for Olympus relayer nodes.
//!
//! Finds peers advertised under shared rendezvous strings, opens sync
//! streams to them, and republishes every relayable frame read from those
//! streams onto a gossipsub topic named after its command. The core is
//! written against the traits in [`network`]; [`service`] provides the
//! libp2p implementation.

pub mod behaviour;
pub mod codec;
pub mod config;
pub mod connect;
pub mod discovery;
pub mod error;
pub mod network;
pub mod notifier;
pub mod peer_manager;
pub mod protocol;
pub mod receiver;
pub mod relayer;
pub mod service;
pub mod tasks;
pub mod topics;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relayer::Relayer;
pub use service::{NetworkHandle, NetworkService};
