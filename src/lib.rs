//! Peer-group coordination for a Bitcoin-style peer-to-peer network.
//!
//! This crate maintains a pool of outbound connections to remote peers
//! discovered through several independent methods, optionally accepts
//! inbound peer-exchange connections, multiplexes requests across the pool
//! with automatic retry on timeout, and aggregates every member's streaming
//! events on one bus.
//!
//! # Architecture
//!
//! All mutable group state is owned by a single coordinator task; dials, DNS
//! lookups, exchange sessions, and peer requests run in worker tasks that
//! report back over channels.
//!
//! ```text
//! PeerGroup handle(s)
//! └── Coordinator Task (owns peers, tx pool, waiters)
//!     ├── Discovery Task per attempt (dial / resolve / exchange)
//!     ├── Request Task per dispatched request
//!     └── Accept/Unaccept Task per toggle
//! ```
//!
//! The peer connection object itself (handshake, framing, ping) and the
//! peer-exchange implementation are external collaborators reached through
//! the [`peer::Peer`]/[`peer::PeerConnector`] and [`exchange::Exchange`]
//! seams.
//!
//! # Usage
//!
//! ```ignore
//! use peergroup::{GroupOptions, Params, PeerGroup};
//!
//! let params = Params::new(0xd9b4bef9)
//!     .with_dns_seeds(vec!["seed.example.net".to_string()]);
//! let group = PeerGroup::new(params, GroupOptions::default(), connector);
//!
//! let mut events = group.subscribe();
//! group.connect()?;
//! ```
//!
//! In bridge mode ([`bridge::Bridge`]) the group instead pairs every inbound
//! client with a freshly dialed outbound transport and splices them.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod group;
pub mod peer;
pub mod protocol;
pub mod transport;
pub mod txpool;

// Re-export main types
pub use bridge::{Bridge, BridgeEvent, BridgeId};
pub use config::{GroupOptions, Params, WebSeed, DEFAULT_NUM_PEERS};
pub use error::{GroupError, GroupResult};
pub use exchange::{Exchange, ExchangeEvent};
pub use group::{GroupEvent, GroupSnapshot, PeerGroup, Phase};
pub use peer::{Peer, PeerConnector, PeerEvent, PeerId, PeerOptions, RequestOptions};
pub use protocol::{Block, BlockHeader, MerkleBlock, Message, Transaction};
pub use transport::Transport;
pub use txpool::TxPool;
