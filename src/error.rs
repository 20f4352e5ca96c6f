//! Peer-group error types.

use std::io;
use thiserror::Error;

use crate::exchange::ExchangeError;
use crate::peer::RequestError;

/// Errors surfaced by the peer group.
#[derive(Debug, Error)]
pub enum GroupError {
    /// No discovery method is currently enabled.
    #[error("No methods available to get new peers")]
    NoDiscoveryMethods,

    /// The TCP dial did not complete within the connect timeout.
    #[error("Connection timed out")]
    ConnectTimeout,

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// DNS seed resolution failed.
    #[error("DNS resolution failed for {host}: {error}")]
    DnsResolutionFailed { host: String, error: String },

    /// A static peer entry could not be parsed as `host[:port]`.
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    /// An operation that requires at least one admitted peer found none.
    #[error("Not connected to any peers")]
    NotConnected,

    /// Eviction reason when the hard limit pushes out the oldest peer.
    #[error("PeerGroup over limit")]
    OverLimit,

    /// Disconnect reason handed to peers while the group shuts down.
    #[error("PeerGroup closing")]
    Closing,

    /// The group has been closed and no longer services operations.
    #[error("PeerGroup is closed")]
    Closed,

    /// Outbound connections are not allowed on a bridge.
    #[error("Do not use connect() with Bridge, only incoming connections are allowed")]
    BridgeConnect,

    /// An exchange-backed operation was requested but no exchange is configured.
    #[error("No peer exchange configured")]
    NoExchange,

    /// A peer request failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The peer exchange reported an error.
    #[error("Peer exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// An admitted peer reported a runtime error.
    #[error("Peer error: {0}")]
    Peer(String),

    /// A peer answered a request with a payload of the wrong kind.
    #[error("Peer returned a mismatched response")]
    BadResponse,
}

impl GroupError {
    /// Whether this error came from a timed-out peer request.
    pub fn is_request_timeout(&self) -> bool {
        matches!(self, GroupError::Request(e) if e.is_timeout())
    }
}

/// Result type for peer-group operations.
pub type GroupResult<T> = Result<T, GroupError>;
