//! Group-level events.
//!
//! Every admitted peer's traffic is re-emitted on one broadcast bus, tagged
//! with the originating peer. Consumers wanting a single specific object by
//! hash use the group's `wait_for_*` methods instead of scanning the bus; the
//! coordinator resolves those waiters the moment the matching hash arrives.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::GroupError;
use crate::peer::PeerId;
use crate::protocol::{Block, BlockHeader, MerkleBlock, Message, Transaction};

/// Capacity of the group broadcast bus.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by a peer group.
#[derive(Debug, Clone)]
pub enum GroupEvent {
    /// A peer was admitted to the pool.
    Peer { peer: PeerId },
    /// An admitted peer left the pool.
    Disconnect {
        peer: PeerId,
        error: Option<Arc<GroupError>>,
    },
    /// A discovery or pre-admission failure. `peer` is set when a wrapped
    /// peer existed before readiness.
    ConnectError {
        error: Arc<GroupError>,
        peer: Option<PeerId>,
    },
    /// An admitted peer reported a runtime error; it is being disconnected.
    PeerError {
        error: Arc<GroupError>,
        peer: PeerId,
    },
    /// A dispatched request timed out and is being retried elsewhere.
    RequestError { error: Arc<GroupError> },
    /// Any message from any admitted peer.
    Message { peer: PeerId, message: Message },
    /// A block arrived from some peer.
    Block { block: Block },
    /// A filtered block arrived from some peer.
    MerkleBlock { merkle_block: MerkleBlock },
    /// A transaction arrived from some peer.
    Tx { tx: Transaction },
    /// An unrecoverable group-level failure.
    Error { error: Arc<GroupError> },
}

/// Blocks filtered off the group bus.
pub struct BlockStream {
    rx: broadcast::Receiver<GroupEvent>,
}

/// Header batches filtered off the group bus.
pub struct HeaderStream {
    rx: broadcast::Receiver<GroupEvent>,
}

/// Transactions filtered off the group bus.
pub struct TxStream {
    rx: broadcast::Receiver<GroupEvent>,
}

impl BlockStream {
    pub(crate) fn new(rx: broadcast::Receiver<GroupEvent>) -> Self {
        Self { rx }
    }

    /// Next block, or `None` once the group is gone. Lagged gaps are skipped.
    pub async fn recv(&mut self) -> Option<Block> {
        loop {
            match self.rx.recv().await {
                Ok(GroupEvent::Block { block }) => return Some(block),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl HeaderStream {
    pub(crate) fn new(rx: broadcast::Receiver<GroupEvent>) -> Self {
        Self { rx }
    }

    /// Next header batch, or `None` once the group is gone.
    pub async fn recv(&mut self) -> Option<Vec<BlockHeader>> {
        loop {
            match self.rx.recv().await {
                Ok(GroupEvent::Message {
                    message: Message::Headers(headers),
                    ..
                }) => return Some(headers),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl TxStream {
    pub(crate) fn new(rx: broadcast::Receiver<GroupEvent>) -> Self {
        Self { rx }
    }

    /// Next transaction, or `None` once the group is gone.
    pub async fn recv(&mut self) -> Option<Transaction> {
        loop {
            match self.rx.recv().await {
                Ok(GroupEvent::Tx { tx }) => return Some(tx),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
