//! Web seed normalization.
//!
//! Web seeds are used once, at startup, to bootstrap exchange-based
//! discovery: each seed becomes one exchange session, and once enough of them
//! are admitted the exchange's `get_new_peer` method takes over.

use crate::config::WebSeed;
use crate::error::{GroupError, GroupResult};
use crate::exchange::ExchangeConnectOptions;

/// A web seed reduced to what the exchange wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedWebSeed {
    /// Exchange transport name.
    pub transport: String,
    /// Host to reach.
    pub address: String,
    /// Session options.
    pub opts: ExchangeConnectOptions,
}

/// Normalize one configured seed. String seeds become websocket sessions on
/// `url.port || default_web_port`.
pub fn normalize_web_seed(seed: &WebSeed, default_web_port: u16) -> GroupResult<NormalizedWebSeed> {
    match seed {
        WebSeed::Url(url) => {
            let (host, port) = parse_url_host(url)?;
            Ok(NormalizedWebSeed {
                transport: "websocket".to_string(),
                address: host,
                opts: ExchangeConnectOptions {
                    port: port.unwrap_or(default_web_port),
                },
            })
        }
        WebSeed::Record {
            transport,
            address,
            port,
        } => Ok(NormalizedWebSeed {
            transport: transport.clone(),
            address: address.clone(),
            opts: ExchangeConnectOptions {
                port: port.unwrap_or(default_web_port),
            },
        }),
    }
}

/// Pull `host` and optional `port` out of `[scheme://]host[:port][/path]`.
fn parse_url_host(url: &str) -> GroupResult<(String, Option<u16>)> {
    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let rest = rest.split('/').next().unwrap_or(rest);
    if rest.is_empty() {
        return Err(GroupError::InvalidAddress(url.to_string()));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|_| GroupError::InvalidAddress(url.to_string()))?;
            Ok((host.to_string(), Some(port)))
        }
        _ => Ok((rest.to_string(), None)),
    }
}
