use crate::command::Command;
use crate::constants::COMMAND_SIZE;
use crate::error::TypesError;

/// One decoded frame: a command name and its opaque payload.
///
/// The command is kept as the raw name the peer sent so that traffic outside
/// the relayable set can still be decoded and then skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub command: String,
    pub payload: Vec<u8>,
}

impl ProtocolMessage {
    /// Build a message, checking that the command fits the frame header.
    pub fn new(command: impl Into<String>, payload: Vec<u8>) -> Result<Self, TypesError> {
        let command = command.into();
        validate_command_name(&command)?;
        Ok(Self { command, payload })
    }

    /// Build a message for a relayable command.
    pub fn from_command(command: Command, payload: Vec<u8>) -> Self {
        Self {
            command: command.as_str().to_string(),
            payload,
        }
    }

    /// The relayable command this message carries, if any.
    pub fn relayable(&self) -> Option<Command> {
        Command::parse(&self.command)
    }
}

/// Check that a command name is non-empty printable ASCII and fits the header.
pub fn validate_command_name(name: &str) -> Result<(), TypesError> {
    if name.len() > COMMAND_SIZE {
        return Err(TypesError::CommandTooLong {
            len: name.len(),
            max: COMMAND_SIZE,
        });
    }
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(TypesError::CommandNotAscii);
    }
    Ok(())
}
