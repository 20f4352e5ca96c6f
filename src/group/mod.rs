//! The peer group.
//!
//! [`PeerGroup`] maintains a pool of outbound connections to remote peers
//! found through the configured discovery methods, multiplexes requests
//! across the pool with automatic retry on timeout, and aggregates every
//! member's traffic on one event bus.
//!
//! The handle is cheap to clone; all state lives in a single coordinator
//! task that the handle talks to over channels. `connect()` returns after
//! scheduling work, and admissions arrive asynchronously as
//! [`GroupEvent::Peer`] emissions.

pub(crate) mod coordinator;
pub mod events;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::{GroupOptions, Params, DEFAULT_ACCEPT_PORT};
use crate::error::{GroupError, GroupResult};
use crate::peer::{
    Peer, PeerConnector, PeerId, PeerRequest, RequestOptions, RequestPayload,
};
use crate::protocol::{Block, BlockHeader, MerkleBlock, Transaction};

use coordinator::GroupCommand;

pub use events::{BlockStream, GroupEvent, HeaderStream, TxStream};

/// Lifecycle phase of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet connecting.
    Idle,
    /// Maintaining the pool at its target size.
    Connecting,
    /// Shut down; no admissions, no completions.
    Closed,
}

/// Observer-facing snapshot of group state.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Whether inbound exchange peers are being accepted.
    pub accepting: bool,
    /// Number of admitted peers.
    pub peer_count: usize,
    /// Number of transactions currently held by the inventory pool.
    pub tx_pool_size: usize,
}

/// Handle to a running peer group.
#[derive(Clone)]
pub struct PeerGroup {
    cmd_tx: mpsc::UnboundedSender<GroupCommand>,
    events: broadcast::Sender<GroupEvent>,
}

impl PeerGroup {
    /// Create a group over the given params and options. The connector is the
    /// seam to the external peer implementation.
    pub fn new(params: Params, opts: GroupOptions, connector: Arc<dyn PeerConnector>) -> Self {
        let (events, _) = broadcast::channel(events::EVENT_CHANNEL_CAPACITY);
        let cmd_tx = coordinator::spawn(Arc::new(params), opts, connector, events.clone());
        Self { cmd_tx, events }
    }

    /// Subscribe to the group event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.events.subscribe()
    }

    /// Start maintaining the pool. Returns once the work is scheduled.
    pub fn connect(&self) -> GroupResult<()> {
        self.command(GroupCommand::Connect)
    }

    /// Close the group: stop the pool, disconnect every admitted peer, and
    /// resolve once the admitted list is empty.
    pub async fn close(&self) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Close { done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Enable accepting inbound websocket and WebRTC peers via the exchange.
    pub async fn accept(&self, port: Option<u16>) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Accept {
            port: port.unwrap_or(DEFAULT_ACCEPT_PORT),
            done,
        })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Disable accepting inbound peers. A no-op when not accepting.
    pub async fn unaccept(&self) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Unaccept { done })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Broadcast a command to every admitted peer. With `assert`, fails when
    /// the pool is empty. Returns how many peers the command was handed to;
    /// per-peer delivery stays best effort.
    pub async fn send(&self, command: &str, payload: Bytes, assert: bool) -> GroupResult<usize> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Send {
            command: command.to_string(),
            payload,
            assert,
            done,
        })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// A uniformly random admitted peer. Fails when the pool is empty.
    pub async fn random_peer(&self) -> GroupResult<Arc<dyn Peer>> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::RandomPeer { done })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Fetch blocks from some peer, retrying on another when one times out.
    pub async fn get_blocks(
        &self,
        hashes: Vec<[u8; 32]>,
        opts: RequestOptions,
    ) -> GroupResult<(Vec<Block>, PeerId)> {
        let outcome = self
            .request(PeerRequest::GetBlocks { hashes, opts })
            .await?;
        match outcome.payload {
            RequestPayload::Blocks(blocks) => Ok((blocks, outcome.peer)),
            _ => Err(GroupError::BadResponse),
        }
    }

    /// Fetch transactions out of a known block from some peer.
    pub async fn get_transactions(
        &self,
        block_hash: [u8; 32],
        txids: Vec<[u8; 32]>,
    ) -> GroupResult<(Vec<Transaction>, PeerId)> {
        let outcome = self
            .request(PeerRequest::GetTransactions { block_hash, txids })
            .await?;
        match outcome.payload {
            RequestPayload::Transactions(txs) => Ok((txs, outcome.peer)),
            _ => Err(GroupError::BadResponse),
        }
    }

    /// Fetch headers following a locator from some peer.
    pub async fn get_headers(
        &self,
        locator: Vec<[u8; 32]>,
        opts: RequestOptions,
    ) -> GroupResult<(Vec<BlockHeader>, PeerId)> {
        let outcome = self
            .request(PeerRequest::GetHeaders { locator, opts })
            .await?;
        match outcome.payload {
            RequestPayload::Headers(headers) => Ok((headers, outcome.peer)),
            _ => Err(GroupError::BadResponse),
        }
    }

    async fn request(&self, request: PeerRequest) -> GroupResult<crate::peer::RequestOutcome> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Request { request, done })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Resolve when a block with this hash arrives from any peer.
    pub async fn wait_for_block(&self, hash: [u8; 32]) -> GroupResult<Block> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::WaitBlock { hash, done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Resolve when a merkle block with this hash arrives from any peer.
    pub async fn wait_for_merkle_block(&self, hash: [u8; 32]) -> GroupResult<MerkleBlock> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::WaitMerkleBlock { hash, done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Resolve when a transaction with this hash arrives from any peer.
    pub async fn wait_for_tx(&self, hash: [u8; 32]) -> GroupResult<Transaction> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::WaitTx { hash, done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Current observer-facing state.
    pub async fn snapshot(&self) -> GroupResult<GroupSnapshot> {
        let (done, rx) = oneshot::channel();
        self.command(GroupCommand::Snapshot { done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Number of admitted peers.
    pub async fn peer_count(&self) -> GroupResult<usize> {
        Ok(self.snapshot().await?.peer_count)
    }

    /// Blocks filtered off the event bus, for the external block assembler.
    pub fn block_stream(&self) -> BlockStream {
        BlockStream::new(self.events.subscribe())
    }

    /// Header batches filtered off the event bus.
    pub fn header_stream(&self) -> HeaderStream {
        HeaderStream::new(self.events.subscribe())
    }

    /// Transactions filtered off the event bus.
    pub fn tx_stream(&self) -> TxStream {
        TxStream::new(self.events.subscribe())
    }

    fn command(&self, cmd: GroupCommand) -> GroupResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| GroupError::Closed)
    }
}
