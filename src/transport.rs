//! Transport type erasure and the TCP dialer.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{GroupError, GroupResult};

/// Bounds every peer transport must satisfy.
pub trait RawStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RawStream for T {}

/// An established bidirectional byte stream.
///
/// Produced by a discovery method and owned by whoever wraps it next: the peer
/// connector for normal groups, the splice pair for bridges. Dropping it
/// releases the underlying socket.
pub type Transport = Box<dyn RawStream>;

/// Connect to `host:port`, bounded by `connect_timeout`.
///
/// The pending socket is destroyed on timeout; exactly one of the timeout and
/// error outcomes fires. A dial in flight never blocks process shutdown since
/// it lives in its own task and is dropped with it.
pub async fn dial(host: &str, port: u16, connect_timeout: Duration) -> GroupResult<Transport> {
    tracing::debug!(host, port, "Dialing peer");

    let stream = match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(GroupError::Io(e)),
        Err(_) => return Err(GroupError::ConnectTimeout),
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(host, port, error = %e, "Failed to set TCP_NODELAY");
    }

    tracing::debug!(host, port, "TCP connection established");
    Ok(Box::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dial_refused() {
        // Port 1 on loopback is almost certainly closed; expect an I/O error,
        // not a timeout.
        let result = dial("127.0.0.1", 1, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(GroupError::Io(_))));
    }

    #[tokio::test]
    async fn test_dial_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = dial("127.0.0.1", addr.port(), Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }
}
