//! Message-level reads and writes over a connected byte stream.
//!
//! [`FrameTransport`] owns the stream and knows only about headers and
//! bodies. It reads nothing beyond the bytes needed for the current header
//! or body, so the stream always stays aligned with the next message.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RserveError};
use crate::protocol::{build_frame, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};

/// Map stream failures that mean the peer went away.
fn map_io_error(e: std::io::Error) -> RserveError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => RserveError::ConnectionClosed,
        _ => RserveError::Io(e),
    }
}

/// Header and body I/O on one stream.
#[derive(Debug)]
pub struct FrameTransport<S> {
    stream: S,
    max_payload_size: u64,
}

impl<S> FrameTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self::with_max_payload_size(stream, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Wrap a connected stream, rejecting response bodies over `max` bytes.
    pub fn with_max_payload_size(stream: S, max: u64) -> Self {
        Self {
            stream,
            max_payload_size: max,
        }
    }

    /// Send one message: header and body in a single write.
    pub async fn write_message(&mut self, command: u32, body: &[u8]) -> Result<()> {
        let frame = build_frame(command, body);
        self.write_raw(&frame).await
    }

    /// Send bytes outside the message framing (session keys).
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await.map_err(map_io_error)?;
        self.stream.flush().await.map_err(map_io_error)
    }

    /// Read and validate one response header.
    pub async fn read_message_header(&mut self) -> Result<Header> {
        let mut buf = [0u8; HEADER_SIZE];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(map_io_error)?;
        let header = Header::decode(&buf)
            .ok_or_else(|| RserveError::ProtocolViolation("short message header".into()))?;
        header.validate_response(self.max_payload_size)?;
        tracing::trace!(
            status = header.command,
            length = header.length,
            "Read message header"
        );
        Ok(header)
    }

    /// Read exactly `len` body bytes.
    pub async fn read_body(&mut self, len: u64) -> Result<Bytes> {
        if len > self.max_payload_size {
            return Err(RserveError::ProtocolViolation(format!(
                "Body size {} exceeds maximum {}",
                len, self.max_payload_size
            )));
        }
        let len = usize::try_from(len).map_err(|_| {
            RserveError::ProtocolViolation(format!("Body size {len} does not fit in memory"))
        })?;
        let mut buf = BytesMut::zeroed(len);
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(map_io_error)?;
        Ok(buf.freeze())
    }

    /// Read a fixed-size block outside the message framing (handshake).
    pub async fn read_block<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(map_io_error)?;
        Ok(buf)
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(map_io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status;

    #[tokio::test]
    async fn test_write_then_read_message() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = FrameTransport::new(client);

        transport.write_message(0x003, b"body").await.unwrap();
        let mut sent = [0u8; HEADER_SIZE + 4];
        server.read_exact(&mut sent).await.unwrap();
        assert_eq!(Header::decode(&sent).unwrap(), Header::new(0x003, 4));
        assert_eq!(&sent[HEADER_SIZE..], b"body");

        server
            .write_all(&build_frame(status::RESP_OK, b"xyz"))
            .await
            .unwrap();
        let header = transport.read_message_header().await.unwrap();
        assert!(header.is_ok());
        assert_eq!(header.length, 3);
        assert_eq!(transport.read_body(3).await.unwrap(), Bytes::from_static(b"xyz"));
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = FrameTransport::new(client);
        server.write_all(&[1, 0, 1, 0, 5]).await.unwrap();
        drop(server);

        let err = transport.read_message_header().await.unwrap_err();
        assert!(matches!(err, RserveError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_short_body_is_connection_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = FrameTransport::new(client);
        server.write_all(b"ab").await.unwrap();
        drop(server);

        assert!(matches!(
            transport.read_body(5).await,
            Err(RserveError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_before_reading() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = FrameTransport::with_max_payload_size(client, 10);
        server
            .write_all(&Header::new(status::RESP_OK, 11).encode())
            .await
            .unwrap();

        let err = transport.read_message_header().await.unwrap_err();
        assert!(matches!(err, RserveError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_request_header_from_server_is_violation() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = FrameTransport::new(client);
        server.write_all(&build_frame(0x003, b"")).await.unwrap();

        assert!(matches!(
            transport.read_message_header().await,
            Err(RserveError::ProtocolViolation(_))
        ));
    }
}
