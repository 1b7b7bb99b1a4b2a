use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A protocol command the relayer republishes onto its own gossip topic.
///
/// The set is closed: anything a peer sends under another name is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    Block,
    Transaction,
    Deposit,
    DepositBatch,
    Vote,
    ValidatorStart,
    Exit,
    ExitBatch,
    Governance,
    MultiSignatureTransaction,
    GetBlocks,
}

impl Command {
    /// Every relayable command.
    pub const ALL: [Command; 11] = [
        Command::Block,
        Command::Transaction,
        Command::Deposit,
        Command::DepositBatch,
        Command::Vote,
        Command::ValidatorStart,
        Command::Exit,
        Command::ExitBatch,
        Command::Governance,
        Command::MultiSignatureTransaction,
        Command::GetBlocks,
    ];

    /// Wire name, also used as the gossip topic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Block => "block",
            Command::Transaction => "transaction",
            Command::Deposit => "deposit",
            Command::DepositBatch => "deposit-batch",
            Command::Vote => "vote",
            Command::ValidatorStart => "validator-start",
            Command::Exit => "exit",
            Command::ExitBatch => "exit-batch",
            Command::Governance => "governance",
            Command::MultiSignatureTransaction => "multi-signature-transaction",
            Command::GetBlocks => "get-blocks",
        }
    }

    /// Look up a relayable command by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s).ok_or_else(|| TypesError::UnknownCommand(s.to_string()))
    }
}
