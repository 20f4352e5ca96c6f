//! Group configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::discovery::NewPeerProducer;
use crate::exchange::Exchange;
use crate::peer::PeerOptions;

/// Default target number of admitted peers.
pub const DEFAULT_NUM_PEERS: usize = 8;

/// Default timeout for establishing an outbound TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Default port for web-seed sessions when neither the seed nor the params
/// name one.
pub const DEFAULT_WEB_PORT: u16 = 8192;

/// Default port for accepting inbound exchange peers.
pub const DEFAULT_ACCEPT_PORT: u16 = 8192;

/// One configured web seed.
#[derive(Debug, Clone)]
pub enum WebSeed {
    /// A URL-ish string, `[scheme://]host[:port][/path]`; normalizes to a
    /// websocket session.
    Url(String),
    /// A fully spelled-out seed record.
    Record {
        /// Exchange transport name ("websocket", "webrtc").
        transport: String,
        /// Host to reach.
        address: String,
        /// Port, the default web port when unset.
        port: Option<u16>,
    },
}

/// Network-level parameters: who this group talks to and how peers are found.
#[derive(Clone, Default)]
pub struct Params {
    /// Network-family identifier peers use to recognize each other.
    pub magic: u32,
    /// DNS seed hostnames for peer discovery.
    pub dns_seeds: Vec<String>,
    /// Static `host[:port]` peer entries.
    pub static_peers: Vec<String>,
    /// Port assumed when an entry or DNS record does not carry one.
    pub default_port: u16,
    /// Port assumed for web seeds without an explicit one.
    pub default_web_port: u16,
    /// Web seeds used once at startup to bootstrap exchange-based discovery.
    pub web_seeds: Vec<WebSeed>,
    /// The peer-exchange collaborator, when web discovery or inbound
    /// acceptance is wanted.
    pub exchange: Option<Arc<dyn Exchange>>,
    /// Custom candidate producer, tried alongside the built-in methods.
    pub get_new_peer: Option<Arc<dyn NewPeerProducer>>,
}

impl Params {
    /// Create params for the given network magic.
    pub fn new(magic: u32) -> Self {
        Self {
            magic,
            default_port: 8333,
            default_web_port: DEFAULT_WEB_PORT,
            ..Default::default()
        }
    }

    /// The network magic serialized the way the exchange wants it.
    pub fn magic_hex(&self) -> String {
        format!("{:08x}", self.magic)
    }

    /// Add DNS seeds for peer discovery.
    pub fn with_dns_seeds(mut self, seeds: Vec<String>) -> Self {
        self.dns_seeds = seeds;
        self
    }

    /// Add static `host[:port]` peers.
    pub fn with_static_peers(mut self, peers: Vec<String>) -> Self {
        self.static_peers = peers;
        self
    }

    /// Set the default peer port.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Set the default web-seed port.
    pub fn with_default_web_port(mut self, port: u16) -> Self {
        self.default_web_port = port;
        self
    }

    /// Add startup web seeds.
    pub fn with_web_seeds(mut self, seeds: Vec<WebSeed>) -> Self {
        self.web_seeds = seeds;
        self
    }

    /// Attach the peer-exchange collaborator.
    pub fn with_exchange(mut self, exchange: Arc<dyn Exchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Attach a custom candidate producer.
    pub fn with_new_peer_producer(mut self, producer: Arc<dyn NewPeerProducer>) -> Self {
        self.get_new_peer = Some(producer);
        self
    }
}

/// Per-group tunables.
#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Target number of admitted peers.
    pub num_peers: usize,
    /// Enforce `num_peers` as a hard cap, evicting the oldest peer on
    /// overflow.
    pub hard_limit: bool,
    /// Timeout for establishing outbound TCP connections.
    pub connect_timeout: Duration,
    /// Use exchange-based web discovery. Always off in the bridge variant.
    pub connect_web: bool,
    /// Option bundle handed to the connector for every peer it builds.
    pub peer_opts: PeerOptions,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            num_peers: DEFAULT_NUM_PEERS,
            hard_limit: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_web: false,
            peer_opts: PeerOptions::default(),
        }
    }
}

impl GroupOptions {
    /// Set the target peer count.
    pub fn with_num_peers(mut self, n: usize) -> Self {
        self.num_peers = n;
        self
    }

    /// Enforce the target as a hard cap.
    pub fn with_hard_limit(mut self, hard: bool) -> Self {
        self.hard_limit = hard;
        self
    }

    /// Set the outbound connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable exchange-based web discovery.
    pub fn with_connect_web(mut self, web: bool) -> Self {
        self.connect_web = web;
        self
    }

    /// Set the per-peer option bundle.
    pub fn with_peer_opts(mut self, opts: PeerOptions) -> Self {
        self.peer_opts = opts;
        self
    }
}
