//! The peer-exchange seam.
//!
//! The exchange introduces peers over websocket and WebRTC sessions. Its
//! implementation lives outside this crate; the group owns a handle and drives
//! it through the [`Exchange`] trait. An exchange is constructed from the
//! network magic in lowercase hex (see [`crate::config::Params::magic_hex`])
//! plus an optional WebRTC implementation.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::transport::Transport;

/// Errors reported by the exchange collaborator.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The named transport is not available on this platform.
    #[error("Transport {transport:?} not found")]
    TransportNotFound { transport: String },

    /// I/O error inside an exchange session.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other exchange failure.
    #[error("{0}")]
    Other(String),
}

/// Options for an outbound exchange session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConnectOptions {
    /// Port to reach the remote exchange endpoint on.
    pub port: u16,
}

/// Options for enabling inbound acceptance on one transport.
#[derive(Debug, Clone)]
pub struct ExchangeAcceptOptions {
    /// Port to listen on.
    pub port: u16,
}

/// Events the exchange pushes to its owner.
pub enum ExchangeEvent {
    /// A peer session was established. `incoming` discriminates sessions the
    /// remote side initiated; only those enter the group's admission path,
    /// outbound sessions are returned from `connect`/`get_new_peer` directly.
    Peer {
        transport: Transport,
        incoming: bool,
    },
    /// The exchange hit an unrecoverable error.
    Error(ExchangeError),
}

impl std::fmt::Debug for ExchangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeEvent::Peer { incoming, .. } => f
                .debug_struct("Peer")
                .field("transport", &"<transport>")
                .field("incoming", incoming)
                .finish(),
            ExchangeEvent::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// Handle to the peer-exchange collaborator.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Open an outbound session over the named transport ("websocket",
    /// "webrtc") to `address`.
    async fn connect(
        &self,
        transport: &str,
        address: &str,
        opts: ExchangeConnectOptions,
    ) -> Result<Transport, ExchangeError>;

    /// Enable accepting inbound sessions on the named transport.
    async fn accept(&self, transport: &str, opts: ExchangeAcceptOptions)
        -> Result<(), ExchangeError>;

    /// Disable accepting inbound sessions on the named transport.
    async fn unaccept(&self, transport: &str) -> Result<(), ExchangeError>;

    /// Ask an already-connected web peer to introduce a fresh peer.
    async fn get_new_peer(&self) -> Result<Transport, ExchangeError>;

    /// Number of currently connected web peers.
    fn peer_count(&self) -> usize;

    /// Subscribe to exchange events. Events arriving before the first
    /// subscription may be dropped.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExchangeEvent>;
}
