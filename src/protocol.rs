//! Decoded protocol values exchanged with peers.
//!
//! Wire encoding and decoding belong to the peer connection object; the group
//! only ever sees the already-decoded values defined here. Hashes are computed
//! by that codec layer and carried alongside the payloads.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A block header as delivered by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of this header.
    pub hash: [u8; 32],
    /// Hash of the previous block.
    pub prev_hash: [u8; 32],
    /// Height claimed for this header.
    pub height: u64,
    /// Header timestamp (seconds since the epoch).
    pub timestamp: u64,
}

/// A full block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transaction ids contained in the block.
    pub txids: Vec<[u8; 32]>,
}

/// A filtered block: header plus the partial merkle proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleBlock {
    /// The block header.
    pub header: BlockHeader,
    /// Proof hashes.
    pub hashes: Vec<[u8; 32]>,
    /// Proof flag bits.
    pub flags: Vec<u8>,
}

/// A transaction as delivered by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hash of the transaction.
    pub hash: [u8; 32],
    /// Raw transaction bytes.
    pub raw: Bytes,
}

/// A decoded message received from a peer.
///
/// The command set the group cares about is closed, so the tagged variant is
/// used rather than a string-indexed topic table; commands outside the set
/// travel as [`Message::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// A full block.
    Block(Block),
    /// A filtered block.
    MerkleBlock(MerkleBlock),
    /// A transaction.
    Tx(Transaction),
    /// A batch of headers.
    Headers(Vec<BlockHeader>),
    /// Any other command, with its raw payload.
    Other {
        /// The wire command name.
        command: String,
        /// The undecoded payload.
        payload: Bytes,
    },
}

impl Message {
    /// The wire command name for this message.
    pub fn command(&self) -> &str {
        match self {
            Message::Block(_) => "block",
            Message::MerkleBlock(_) => "merkleblock",
            Message::Tx(_) => "tx",
            Message::Headers(_) => "headers",
            Message::Other { command, .. } => command,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_command() {
        let header = BlockHeader {
            hash: [1u8; 32],
            prev_hash: [0u8; 32],
            height: 1,
            timestamp: 0,
        };
        assert_eq!(
            Message::Block(Block {
                header: header.clone(),
                txids: Vec::new()
            })
            .command(),
            "block"
        );
        assert_eq!(Message::Headers(vec![header]).command(), "headers");
        assert_eq!(
            Message::Other {
                command: "getaddr".to_string(),
                payload: Bytes::new()
            }
            .command(),
            "getaddr"
        );
    }
}
