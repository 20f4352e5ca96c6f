//! DNS seed resolution.

use std::net::IpAddr;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::{GroupError, GroupResult};

/// Resolves DNS seed hostnames to candidate peer addresses.
pub struct DnsSeedResolver {
    resolver: TokioAsyncResolver,
}

impl DnsSeedResolver {
    /// Create a resolver over the system defaults.
    pub fn new() -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self { resolver }
    }

    /// Resolve one seed hostname to its address records.
    pub async fn resolve_seed(&self, hostname: &str) -> GroupResult<Vec<IpAddr>> {
        tracing::debug!(hostname, "Resolving DNS seed");

        let response = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| GroupError::DnsResolutionFailed {
                host: hostname.to_string(),
                error: e.to_string(),
            })?;

        let addrs: Vec<IpAddr> = response.iter().collect();
        tracing::debug!(hostname, count = addrs.len(), "Resolved DNS seed");

        Ok(addrs)
    }
}

impl Default for DnsSeedResolver {
    fn default() -> Self {
        Self::new()
    }
}
