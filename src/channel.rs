//! One-request-at-a-time command exchange.
//!
//! ```text
//!            command()
//!   Idle ───────────────► AwaitingHeader ───► AwaitingBody ───► Idle
//!    ▲                        │ error status        │
//!    └────────────────────────┘ (ServerRejected)    │
//!                                                   │ fatal error, timeout,
//!   Broken ◄────────────────────────────────────────┘ or dropped future
//! ```
//!
//! The protocol carries no request identifiers, so a channel that lost
//! track of where it is in the stream can never recover. Any fatal error
//! while a command is in flight leaves the channel `Broken`, and so does a
//! command future dropped before it finished: the next call finds the
//! channel outside `Idle` and fails with `ChannelBroken`.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{decode_response_body, encode_params, DecodedItem, Param};
use crate::error::{Result, RserveError};
use crate::protocol::{Command, Frame};
use crate::transport::FrameTransport;

/// Where the channel is in the current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Ready for a command.
    Idle,
    /// Request written, waiting for the response header.
    AwaitingHeader,
    /// Header read, reading the body.
    AwaitingBody,
    /// Out of sync with the stream. Terminal.
    Broken,
}

/// Sends commands and reads their responses over a [`FrameTransport`].
#[derive(Debug)]
pub struct CommandChannel<S> {
    transport: FrameTransport<S>,
    state: ChannelState,
    timeout: Option<Duration>,
}

impl<S> CommandChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a channel. `timeout` bounds each whole exchange.
    pub fn new(transport: FrameTransport<S>, timeout: Option<Duration>) -> Self {
        Self {
            transport,
            state: ChannelState::Idle,
            timeout,
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether a command may be sent.
    pub fn is_usable(&self) -> bool {
        self.state == ChannelState::Idle
    }

    /// Send `command` and decode the response body into records.
    pub async fn command(
        &mut self,
        command: Command,
        params: &[Param<'_>],
    ) -> Result<Vec<DecodedItem>> {
        let body = self.exchange(command, params).await?;
        decode_response_body(body).map_err(|e| self.fail(command, e))
    }

    /// Send `command` and return the response body undecoded.
    ///
    /// Used for file reads, where the body is one raw chunk.
    pub async fn command_read_stream(
        &mut self,
        command: Command,
        params: &[Param<'_>],
    ) -> Result<Bytes> {
        self.exchange(command, params).await
    }

    async fn exchange(&mut self, command: Command, params: &[Param<'_>]) -> Result<Bytes> {
        match self.state {
            ChannelState::Idle => {}
            ChannelState::Broken => return Err(RserveError::ChannelBroken),
            // an earlier command future was dropped mid-exchange
            ChannelState::AwaitingHeader | ChannelState::AwaitingBody => {
                tracing::warn!(state = ?self.state, "Command issued while another was in flight");
                self.state = ChannelState::Broken;
                return Err(RserveError::ChannelBroken);
            }
        }

        // nothing is written if a parameter cannot be encoded
        let body = encode_params(params)?;
        tracing::debug!(%command, body_len = body.len(), "Sending command");

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(command, &body))
                .await
                .unwrap_or(Err(RserveError::Timeout)),
            None => self.run(command, &body).await,
        };

        result.map_err(|e| {
            if e.is_fatal() {
                self.fail(command, e)
            } else {
                e
            }
        })
    }

    async fn run(&mut self, command: Command, body: &[u8]) -> Result<Bytes> {
        self.state = ChannelState::AwaitingHeader;
        self.transport.write_message(command.code(), body).await?;
        let header = self.transport.read_message_header().await?;

        self.state = ChannelState::AwaitingBody;
        // an error body is drained to keep the stream aligned, never decoded
        let body = self.transport.read_body(header.length).await?;
        let frame = Frame::new(header, body);
        self.state = ChannelState::Idle;

        if frame.is_error() {
            let code = frame.header.error_code();
            tracing::warn!(%command, code, "Server rejected command");
            return Err(RserveError::ServerRejected { code });
        }
        tracing::debug!(%command, body_len = frame.body().len(), "Received response");
        Ok(frame.into_body())
    }

    fn fail(&mut self, command: Command, e: RserveError) -> RserveError {
        tracing::warn!(%command, error = %e, "Command channel broken");
        self.state = ChannelState::Broken;
        e
    }

    /// Shut down the stream. The channel is unusable afterwards.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ChannelState::Broken;
        self.transport.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, status, Header, HEADER_SIZE};
    use crate::sexp::Sexp;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn channel(timeout: Option<Duration>) -> (CommandChannel<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(4096);
        (CommandChannel::new(FrameTransport::new(client), timeout), server)
    }

    async fn read_request(server: &mut DuplexStream) -> (Header, Vec<u8>) {
        let mut head = [0u8; HEADER_SIZE];
        server.read_exact(&mut head).await.unwrap();
        let header = Header::decode(&head).unwrap();
        let mut body = vec![0u8; header.length as usize];
        server.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    #[tokio::test]
    async fn test_command_roundtrip() {
        let (mut chan, mut server) = channel(None);
        let value = Sexp::from(vec![1, 2, 3]);
        let reply = encode_params(&[Param::Sexp(&value)]).unwrap();

        let server_task = tokio::spawn(async move {
            let (header, body) = read_request(&mut server).await;
            assert_eq!(header.command, Command::Eval.code());
            assert_eq!(body, encode_params(&[Param::String("1:3")]).unwrap().to_vec());
            server
                .write_all(&build_frame(status::RESP_OK, &reply))
                .await
                .unwrap();
            server
        });

        let items = chan
            .command(Command::Eval, &[Param::String("1:3")])
            .await
            .unwrap();
        assert_eq!(items, vec![DecodedItem::Sexp(value)]);
        assert_eq!(chan.state(), ChannelState::Idle);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_recoverable() {
        let (mut chan, mut server) = channel(None);

        let server_task = tokio::spawn(async move {
            read_request(&mut server).await;
            // garbage body that must not be decoded
            let frame = build_frame(status::error_with_code(5), &[0xEE; 6]);
            server.write_all(&frame).await.unwrap();

            read_request(&mut server).await;
            server
                .write_all(&build_frame(status::RESP_OK, b""))
                .await
                .unwrap();
            server
        });

        let err = chan.command(Command::Eval, &[]).await.unwrap_err();
        assert!(matches!(err, RserveError::ServerRejected { code: 5 }));
        assert!(chan.is_usable());

        assert!(chan.command(Command::VoidEval, &[]).await.unwrap().is_empty());
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_stream_returns_raw_body() {
        let (mut chan, mut server) = channel(None);
        let server_task = tokio::spawn(async move {
            read_request(&mut server).await;
            server
                .write_all(&build_frame(status::RESP_OK, b"\x01\x02raw"))
                .await
                .unwrap();
            server
        });

        let chunk = chan
            .command_read_stream(Command::ReadFile, &[Param::Int(8)])
            .await
            .unwrap();
        assert_eq!(chunk, Bytes::from_static(b"\x01\x02raw"));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_breaks_channel() {
        let (mut chan, mut server) = channel(None);
        let server_task = tokio::spawn(async move {
            read_request(&mut server).await;
            server
                .write_all(&build_frame(status::RESP_OK, &[0x3F, 0, 0, 0]))
                .await
                .unwrap();
            server
        });

        let err = chan.command(Command::Eval, &[]).await.unwrap_err();
        assert!(matches!(err, RserveError::MalformedResponse(_)));
        assert_eq!(chan.state(), ChannelState::Broken);
        assert!(matches!(
            chan.command(Command::Eval, &[]).await,
            Err(RserveError::ChannelBroken)
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_breaks_channel() {
        let (mut chan, _server) = channel(Some(Duration::from_millis(50)));

        let err = chan.command(Command::Eval, &[]).await.unwrap_err();
        assert!(matches!(err, RserveError::Timeout));
        assert_eq!(chan.state(), ChannelState::Broken);
        assert!(matches!(
            chan.command(Command::Eval, &[]).await,
            Err(RserveError::ChannelBroken)
        ));
    }

    #[tokio::test]
    async fn test_closed_connection_breaks_channel() {
        let (mut chan, server) = channel(None);
        drop(server);

        let err = chan.command(Command::Eval, &[]).await.unwrap_err();
        assert!(matches!(err, RserveError::ConnectionClosed));
        assert!(!chan.is_usable());
    }

    #[tokio::test]
    async fn test_unencodable_param_sends_nothing() {
        let (mut chan, mut server) = channel(None);

        let err = chan
            .command(Command::Eval, &[Param::String("a\0b")])
            .await
            .unwrap_err();
        assert!(matches!(err, RserveError::InvalidOperation(_)));
        assert!(chan.is_usable());

        chan.close().await.unwrap();
        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
