//! Peer discovery.
//!
//! Each discovery method produces one candidate transport. The dispatcher
//! rebuilds the enabled set on every attempt and picks one method uniformly
//! at random; exchange-based discovery only becomes eligible once web peers
//! exist, so eligibility has to track live state.

pub mod dns;
pub mod static_peers;
pub mod webseed;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::config::Params;
use crate::error::{GroupError, GroupResult};
use crate::transport::Transport;

pub use dns::DnsSeedResolver;
pub use static_peers::parse_static_peer;
pub use webseed::{normalize_web_seed, NormalizedWebSeed};

/// A user-provided candidate producer, tried alongside the built-in methods.
#[async_trait]
pub trait NewPeerProducer: Send + Sync {
    /// Produce one candidate transport.
    async fn get_new_peer(&self) -> GroupResult<Transport>;
}

/// The discovery methods the dispatcher can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Resolve a random DNS seed.
    DnsSeeds,
    /// Parse a random static peer entry.
    StaticPeers,
    /// Ask the exchange for an introduction from a connected web peer.
    Exchange,
    /// The user-provided producer.
    Custom,
}

/// Discovery dispatcher: picks a method per attempt and runs it.
pub struct Discovery {
    params: Arc<Params>,
    connect_timeout: Duration,
    connect_web: bool,
    resolver: Option<DnsSeedResolver>,
}

impl Discovery {
    /// Create a dispatcher over the given params.
    pub fn new(params: Arc<Params>, connect_timeout: Duration, connect_web: bool) -> Self {
        let resolver = if params.dns_seeds.is_empty() {
            None
        } else {
            Some(DnsSeedResolver::new())
        };

        Self {
            params,
            connect_timeout,
            connect_web,
            resolver,
        }
    }

    /// The currently enabled discovery methods.
    pub fn enabled_sources(&self) -> Vec<DiscoverySource> {
        let mut sources = Vec::new();

        if !self.params.dns_seeds.is_empty() {
            sources.push(DiscoverySource::DnsSeeds);
        }
        if !self.params.static_peers.is_empty() {
            sources.push(DiscoverySource::StaticPeers);
        }
        if self.connect_web {
            if let Some(exchange) = &self.params.exchange {
                if exchange.peer_count() > 0 {
                    sources.push(DiscoverySource::Exchange);
                }
            }
        }
        if self.params.get_new_peer.is_some() {
            sources.push(DiscoverySource::Custom);
        }

        sources
    }

    /// Run one discovery attempt: pick an enabled method at random and
    /// produce a transport.
    pub async fn next_transport(&self) -> GroupResult<Transport> {
        let sources = self.enabled_sources();
        let source = *sources
            .choose(&mut rand::thread_rng())
            .ok_or(GroupError::NoDiscoveryMethods)?;

        tracing::debug!(?source, "Discovery attempt");
        self.acquire(source).await
    }

    /// Produce a transport from one specific method.
    pub async fn acquire(&self, source: DiscoverySource) -> GroupResult<Transport> {
        match source {
            DiscoverySource::DnsSeeds => self.from_dns().await,
            DiscoverySource::StaticPeers => self.from_static().await,
            DiscoverySource::Exchange => self.from_exchange().await,
            DiscoverySource::Custom => self.from_custom().await,
        }
    }

    async fn from_dns(&self) -> GroupResult<Transport> {
        let seed = self
            .params
            .dns_seeds
            .choose(&mut rand::thread_rng())
            .ok_or(GroupError::NoDiscoveryMethods)?;

        // Resolver exists whenever dns_seeds is non-empty.
        let resolver = self.resolver.as_ref().ok_or(GroupError::NoDiscoveryMethods)?;
        let addrs = resolver.resolve_seed(seed).await?;
        let ip = *addrs
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| GroupError::DnsResolutionFailed {
                host: seed.clone(),
                error: "no addresses".to_string(),
            })?;

        crate::transport::dial(&ip.to_string(), self.params.default_port, self.connect_timeout)
            .await
    }

    async fn from_static(&self) -> GroupResult<Transport> {
        let entry = self
            .params
            .static_peers
            .choose(&mut rand::thread_rng())
            .ok_or(GroupError::NoDiscoveryMethods)?;

        let (host, port) = parse_static_peer(entry, self.params.default_port)?;
        crate::transport::dial(&host, port, self.connect_timeout).await
    }

    async fn from_exchange(&self) -> GroupResult<Transport> {
        let exchange = self.params.exchange.as_ref().ok_or(GroupError::NoExchange)?;
        Ok(exchange.get_new_peer().await?)
    }

    async fn from_custom(&self) -> GroupResult<Transport> {
        let producer = self
            .params
            .get_new_peer
            .as_ref()
            .ok_or(GroupError::NoDiscoveryMethods)?;
        producer.get_new_peer().await
    }
}
