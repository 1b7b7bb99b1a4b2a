use std::time::Duration;

// ─── Wire Parameters ─────────────────────────────────────────────────────────

/// Size of the network magic prefix in bytes.
pub const MAGIC_SIZE: usize = 4;

/// Fixed width of the command field in a frame header (NUL padded ASCII).
pub const COMMAND_SIZE: usize = 40;

/// Size of the payload checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Total frame header size: magic + command + length + checksum.
pub const FRAME_HEADER_SIZE: usize = MAGIC_SIZE + COMMAND_SIZE + 4 + CHECKSUM_SIZE;

/// Maximum payload carried by a single frame.
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024; // 8 MiB

// ─── Protocol Identifiers ────────────────────────────────────────────────────

/// Stream protocol used for relaying framed messages between nodes.
pub const SYNC_PROTOCOL_ID: &str = "/ogen/sync/0.1.0";

/// Legacy discovery handshake protocol. Declared for reference, never registered.
pub const DISCOVERY_PROTOCOL_ID: &str = "/ogen/discovery/0.1.0";

/// Prefix of every rendezvous record key.
pub const RENDEZVOUS_NAMESPACE: &str = "olympus/rendezvous/";

// ─── Relayer Parameters ──────────────────────────────────────────────────────

/// Default TCP port the relayer listens on.
pub const DEFAULT_RELAYER_PORT: u16 = 25000;

/// Wait between two discovery requests for the same rendezvous string.
pub const REDISCOVER_INTERVAL: Duration = Duration::from_secs(10);

/// Default maximum number of simultaneous connections.
pub const MAX_RELAYER_CONNECTIONS: usize = 256;

/// Idle connections are closed after this long.
pub const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// How long shutdown waits for spawned tasks before aborting them.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);
