//! Endpoint providers.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Result, RserveError};

/// Yields a connected byte stream for a host and port.
///
/// The session layer never opens sockets itself, so tunnels or
/// pre-established streams can be supplied through this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stream type produced.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a stream to `host:port`.
    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    nodelay: bool,
}

impl TcpConnector {
    /// Create a connector; `nodelay` sets `TCP_NODELAY` on each stream.
    pub fn new(nodelay: bool) -> Self {
        Self { nodelay }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                RserveError::Io(std::io::Error::new(
                    e.kind(),
                    format!("connection to {host}:{port} refused"),
                ))
            } else {
                RserveError::Io(e)
            }
        })?;
        stream.set_nodelay(self.nodelay)?;
        tracing::debug!(%host, port, nodelay = self.nodelay, "TCP connected");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(&buf).await.unwrap();
        });

        let mut client = TcpConnector::default()
            .connect("127.0.0.1", port)
            .await
            .unwrap();
        assert!(client.nodelay().unwrap());
        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpConnector::new(false)
            .connect("127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, RserveError::Io(_)));
    }
}
