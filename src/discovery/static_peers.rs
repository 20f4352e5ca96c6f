//! Static peer list parsing.

use crate::error::{GroupError, GroupResult};

/// Parse one static peer entry as `host[:port]`.
///
/// IPv6 literals must be bracketed (`[::1]:8333`) to disambiguate the colon.
pub fn parse_static_peer(entry: &str, default_port: u16) -> GroupResult<(String, u16)> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(GroupError::InvalidAddress(entry.to_string()));
    }

    // Bracketed IPv6 form.
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| GroupError::InvalidAddress(entry.to_string()))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| GroupError::InvalidAddress(entry.to_string()))?,
            None if tail.is_empty() => default_port,
            None => return Err(GroupError::InvalidAddress(entry.to_string())),
        };
        return Ok((host.to_string(), port));
    }

    match entry.rsplit_once(':') {
        // A second colon means an unbracketed IPv6 literal without a port.
        Some((host, _)) if host.contains(':') => Ok((entry.to_string(), default_port)),
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| GroupError::InvalidAddress(entry.to_string()))?;
            if host.is_empty() {
                return Err(GroupError::InvalidAddress(entry.to_string()));
            }
            Ok((host.to_string(), port))
        }
        None => Ok((entry.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_with_port() {
        assert_eq!(
            parse_static_peer("1.2.3.4:9000", 8333).unwrap(),
            ("1.2.3.4".to_string(), 9000)
        );
    }

    #[test]
    fn test_host_without_port() {
        assert_eq!(
            parse_static_peer("seed.example.com", 8333).unwrap(),
            ("seed.example.com".to_string(), 8333)
        );
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(
            parse_static_peer("[::1]:9000", 8333).unwrap(),
            ("::1".to_string(), 9000)
        );
        assert_eq!(
            parse_static_peer("[2001:db8::1]", 8333).unwrap(),
            ("2001:db8::1".to_string(), 8333)
        );
    }

    #[test]
    fn test_invalid_entries() {
        assert!(parse_static_peer("", 8333).is_err());
        assert!(parse_static_peer("host:notaport", 8333).is_err());
        assert!(parse_static_peer(":9000", 8333).is_err());
    }
}
