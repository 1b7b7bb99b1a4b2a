use futures::prelude::*;
use olympus_types::constants::{
    CHECKSUM_SIZE, COMMAND_SIZE, FRAME_HEADER_SIZE, MAGIC_SIZE, MAX_PAYLOAD_SIZE,
};
use olympus_types::message::validate_command_name;
use olympus_types::ProtocolMessage;
use std::io;

use crate::error::RelayError;

/// Wire format of one frame:
///
/// `[4-byte BE magic][40-byte NUL-padded command][4-byte BE length][4-byte checksum][payload]`
///
/// The checksum is the first four bytes of the blake3 hash of the payload.
const COMMAND_OFFSET: usize = MAGIC_SIZE;
const LENGTH_OFFSET: usize = COMMAND_OFFSET + COMMAND_SIZE;
const CHECKSUM_OFFSET: usize = LENGTH_OFFSET + 4;

/// Read exactly one frame from `io`.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first header
/// byte. A stream that ends inside a frame is reported as a codec error.
/// Never consumes bytes past the end of the frame.
pub async fn read_message<T>(io: &mut T, magic: u32) -> Result<Option<ProtocolMessage>, RelayError>
where
    T: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = io.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RelayError::CodecError {
                reason: format!(
                    "truncated frame header: got {} of {} bytes",
                    filled, FRAME_HEADER_SIZE
                ),
            });
        }
        filled += n;
    }

    let (command, len, checksum) = parse_header(&header, magic)?;

    let mut payload = vec![0u8; len];
    io.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            RelayError::CodecError {
                reason: format!("truncated '{}' payload: expected {} bytes", command, len),
            }
        } else {
            RelayError::Io(e)
        }
    })?;

    if payload_checksum(&payload) != checksum {
        return Err(RelayError::ChecksumMismatch { command });
    }

    Ok(Some(ProtocolMessage { command, payload }))
}

/// Encode a message into a single frame for the given network.
pub fn encode_message(msg: &ProtocolMessage, magic: u32) -> Result<Vec<u8>, RelayError> {
    validate_command_name(&msg.command).map_err(|e| RelayError::InvalidCommand {
        reason: e.to_string(),
    })?;

    if msg.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(RelayError::MessageTooLarge {
            size: msg.payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + msg.payload.len());
    out.extend_from_slice(&magic.to_be_bytes());
    let mut command = [0u8; COMMAND_SIZE];
    command[..msg.command.len()].copy_from_slice(msg.command.as_bytes());
    out.extend_from_slice(&command);
    out.extend_from_slice(&(msg.payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload_checksum(&msg.payload));
    out.extend_from_slice(&msg.payload);
    Ok(out)
}

fn parse_header(
    header: &[u8; FRAME_HEADER_SIZE],
    magic: u32,
) -> Result<(String, usize, [u8; CHECKSUM_SIZE]), RelayError> {
    let actual = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if actual != magic {
        return Err(RelayError::BadMagic {
            expected: magic,
            actual,
        });
    }

    let command = parse_command(&header[COMMAND_OFFSET..LENGTH_OFFSET])?;

    let len = u32::from_be_bytes([
        header[LENGTH_OFFSET],
        header[LENGTH_OFFSET + 1],
        header[LENGTH_OFFSET + 2],
        header[LENGTH_OFFSET + 3],
    ]) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(RelayError::MessageTooLarge {
            size: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut checksum = [0u8; CHECKSUM_SIZE];
    checksum.copy_from_slice(&header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_SIZE]);

    Ok((command, len, checksum))
}

/// Decode the NUL-padded command field. Padding must be trailing only.
fn parse_command(field: &[u8]) -> Result<String, RelayError> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    if field[end..].iter().any(|b| *b != 0) {
        return Err(RelayError::InvalidCommand {
            reason: "non-zero bytes after command padding".to_string(),
        });
    }
    let name = std::str::from_utf8(&field[..end]).map_err(|e| RelayError::InvalidCommand {
        reason: e.to_string(),
    })?;
    validate_command_name(name).map_err(|e| RelayError::InvalidCommand {
        reason: e.to_string(),
    })?;
    Ok(name.to_string())
}

fn payload_checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let hash = blake3::hash(payload);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_SIZE]);
    out
}
