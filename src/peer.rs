//! The peer seam.
//!
//! The concrete peer connection object (handshake, ping, message framing)
//! lives outside this crate. The group talks to it through the [`Peer`] trait
//! and receives its lifecycle through [`PeerEvent`]s; [`PeerConnector`] is how
//! a raw transport becomes a live peer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::{GroupError, GroupResult};
use crate::protocol::{Block, BlockHeader, Message, Transaction};
use crate::transport::Transport;

/// Unique identifier for a peer within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Create a new peer ID from a counter value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Options handed to the connector for every peer it builds.
#[derive(Debug, Clone)]
pub struct PeerOptions {
    /// User agent to announce during the handshake.
    pub user_agent: Option<String>,
    /// Timeout for completing the handshake.
    pub handshake_timeout: Duration,
    /// Timeout the peer applies to its own request methods.
    pub request_timeout: Duration,
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Lifecycle and traffic events a peer reports to its group.
#[derive(Debug)]
pub enum PeerEvent {
    /// Handshake completed; the peer may be admitted.
    Ready { peer: PeerId },
    /// A decoded message arrived.
    Message { peer: PeerId, message: Message },
    /// The session ended. `error` is set when the end was not graceful.
    Disconnected {
        peer: PeerId,
        error: Option<Arc<GroupError>>,
    },
    /// The peer hit an error but may not have disconnected yet.
    Error {
        peer: PeerId,
        error: Arc<GroupError>,
    },
}

/// Error completing a peer request.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The peer did not answer within its request timeout.
    #[error("Request timed out")]
    Timeout,
    /// The peer disconnected before answering.
    #[error("Peer disconnected before responding")]
    Disconnected,
    /// Any other failure reported by the peer.
    #[error("{0}")]
    Other(String),
}

impl RequestError {
    /// Whether this failure was a timeout. Timed-out requests cause the peer
    /// to be dropped and the request retried elsewhere.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout)
    }
}

/// Options for `get_blocks` / `get_headers` requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Cap on the number of returned items, peer default when unset.
    pub limit: Option<usize>,
    /// Whether filtered (merkle) blocks are wanted instead of full blocks.
    pub filtered: bool,
}

/// A request the group can dispatch to any admitted peer.
#[derive(Debug, Clone)]
pub enum PeerRequest {
    /// Fetch full blocks by hash.
    GetBlocks {
        hashes: Vec<[u8; 32]>,
        opts: RequestOptions,
    },
    /// Fetch transactions out of a known block.
    GetTransactions {
        block_hash: [u8; 32],
        txids: Vec<[u8; 32]>,
    },
    /// Fetch headers following a locator.
    GetHeaders {
        locator: Vec<[u8; 32]>,
        opts: RequestOptions,
    },
}

/// Successful payload of a dispatched request.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Blocks(Vec<Block>),
    Transactions(Vec<Transaction>),
    Headers(Vec<BlockHeader>),
}

/// The outcome of a dispatched request: the payload and who served it.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// The peer that answered.
    pub peer: PeerId,
    /// The answer.
    pub payload: RequestPayload,
}

/// A live, handshaken peer session.
///
/// Implementations run their own read/write loop and report through the event
/// channel given to the connector. All methods are non-blocking; `send`
/// enqueues, requests await the peer's own timeout discipline.
#[async_trait]
pub trait Peer: Send + Sync {
    /// This peer's group-local id.
    fn id(&self) -> PeerId;

    /// Enqueue a command for delivery. Best effort, no delivery guarantee.
    fn send(&self, command: &str, payload: Bytes) -> GroupResult<()>;

    /// Ask the peer to tear the session down. Idempotent; the eventual
    /// [`PeerEvent::Disconnected`] carries `reason` when one is given.
    fn disconnect(&self, reason: Option<Arc<GroupError>>);

    /// Fetch full blocks by hash.
    async fn get_blocks(
        &self,
        hashes: Vec<[u8; 32]>,
        opts: RequestOptions,
    ) -> Result<Vec<Block>, RequestError>;

    /// Fetch transactions out of a known block.
    async fn get_transactions(
        &self,
        block_hash: [u8; 32],
        txids: Vec<[u8; 32]>,
    ) -> Result<Vec<Transaction>, RequestError>;

    /// Fetch headers following a locator.
    async fn get_headers(
        &self,
        locator: Vec<[u8; 32]>,
        opts: RequestOptions,
    ) -> Result<Vec<BlockHeader>, RequestError>;
}

/// Builds a live [`Peer`] over an established transport.
///
/// The connector takes ownership of the transport, spawns whatever driver it
/// needs, and reports readiness and everything after it on `events`. The group
/// holds the returned handle but does not admit the peer until
/// [`PeerEvent::Ready`] arrives.
pub trait PeerConnector: Send + Sync {
    fn wrap(
        &self,
        id: PeerId,
        transport: Transport,
        opts: &PeerOptions,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Arc<dyn Peer>;
}

/// Run one [`PeerRequest`] against a peer, erasing the method dispatch.
pub(crate) async fn run_request(
    peer: &dyn Peer,
    request: PeerRequest,
) -> Result<RequestPayload, RequestError> {
    match request {
        PeerRequest::GetBlocks { hashes, opts } => {
            peer.get_blocks(hashes, opts).await.map(RequestPayload::Blocks)
        }
        PeerRequest::GetTransactions { block_hash, txids } => peer
            .get_transactions(block_hash, txids)
            .await
            .map(RequestPayload::Transactions),
        PeerRequest::GetHeaders { locator, opts } => {
            peer.get_headers(locator, opts).await.map(RequestPayload::Headers)
        }
    }
}
