//! Connection builder and session operations.
//!
//! The [`ConnectionBuilder`] collects settings and opens a [`Connection`]:
//! 1. Open the stream through a [`Connector`]
//! 2. Read and check the identification block
//! 3. Log in if the server asks for it
//! 4. Hand back a connection ready for commands
//!
//! # Example
//!
//! ```no_run
//! use rserve_client::Connection;
//!
//! #[tokio::main]
//! async fn main() -> rserve_client::Result<()> {
//!     let mut conn = Connection::builder()
//!         .host("127.0.0.1")
//!         .port(6311)
//!         .credentials("ann", "secret")
//!         .command_timeout(std::time::Duration::from_secs(30))
//!         .connect()
//!         .await?;
//!
//!     conn.assign("x", &vec![1.5, 2.5].into()).await?;
//!     let mean = conn.eval("mean(x)").await?;
//!     assert_eq!(mean.as_double()?, 2.0);
//!     conn.close().await
//! }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::channel::{ChannelState, CommandChannel};
use crate::codec::{DecodedItem, Param};
use crate::config::ConnectionConfig;
use crate::control::{login_payload, PasswordObfuscator, ServerInfo, HANDSHAKE_SIZE};
use crate::error::{Result, RserveError};
use crate::protocol::Command;
use crate::sexp::{Sexp, SexpData};
use crate::transport::{Connector, FrameTransport, TcpConnector};

/// Size of the key identifying a detached session.
pub const SESSION_KEY_SIZE: usize = 32;

/// A connection over TCP.
pub type TcpConnection = Connection<TcpStream>;

/// Run `fut`, failing with `Timeout` once `limit` elapses.
async fn within<T>(limit: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(RserveError::Timeout)),
        None => fut.await,
    }
}

/// Builder for configuring and opening a [`Connection`].
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    obfuscator: Option<Box<dyn PasswordObfuscator>>,
}

impl ConnectionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ConnectionConfig::default())
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            obfuscator: None,
        }
    }

    /// Server host. Default: `127.0.0.1`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Server port. Default: 6311
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// User name for servers that require login.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    /// Password for servers that require login.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set user and password together.
    pub fn credentials(self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user(user).password(password)
    }

    /// Limit on connecting plus handshake and login.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Limit on each command exchange.
    ///
    /// A command that runs out of time leaves the connection broken.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Largest response body accepted. Default: 1 GiB
    pub fn max_payload_size(mut self, bytes: u64) -> Self {
        self.config.max_payload_size = bytes;
        self
    }

    /// Set `TCP_NODELAY`. Default: true
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Password transform for servers that require obfuscated login.
    pub fn obfuscator(mut self, obfuscator: impl PasswordObfuscator + 'static) -> Self {
        self.obfuscator = Some(Box::new(obfuscator));
        self
    }

    /// Current settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect over TCP.
    pub async fn connect(self) -> Result<TcpConnection> {
        let connector = TcpConnector::new(self.config.nodelay);
        self.connect_with(&connector).await
    }

    /// Connect through a custom endpoint provider.
    pub async fn connect_with<C: Connector>(self, connector: &C) -> Result<Connection<C::Stream>> {
        let limit = self.config.connect_timeout();
        within(limit, async move {
            let stream = connector
                .connect(&self.config.host, self.config.port)
                .await?;
            self.establish(stream).await
        })
        .await
    }

    /// Run the handshake and login over an already connected stream.
    pub async fn from_stream<S>(self, stream: S) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        within(self.config.connect_timeout(), self.establish(stream)).await
    }

    /// Resume a detached session over TCP.
    pub async fn attach(self, session: &SessionKey) -> Result<TcpConnection> {
        let connector = TcpConnector::new(self.config.nodelay);
        self.attach_with(&connector, session).await
    }

    /// Resume a detached session through a custom endpoint provider.
    ///
    /// Connects to the host and port recorded in `session`; the builder's
    /// own host and port are ignored.
    pub async fn attach_with<C: Connector>(
        self,
        connector: &C,
        session: &SessionKey,
    ) -> Result<Connection<C::Stream>> {
        let limit = self.config.connect_timeout();
        within(limit, async move {
            let stream = connector.connect(&session.host, session.port).await?;
            self.resume(stream, session).await
        })
        .await
    }

    /// Resume a detached session over an already connected stream.
    pub async fn attach_stream<S>(self, stream: S, session: &SessionKey) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        within(self.config.connect_timeout(), self.resume(stream, session)).await
    }

    async fn establish<S>(self, stream: S) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut transport = FrameTransport::with_max_payload_size(stream, self.config.max_payload_size);
        let block = transport.read_block::<HANDSHAKE_SIZE>().await?;
        let server_info = ServerInfo::parse(&block)?;
        tracing::info!(
            host = %self.config.host,
            version = %server_info.version,
            auth = ?server_info.auth,
            "Connected to Rserve"
        );

        // credentials are checked before anything is written
        let payload = login_payload(
            &server_info.auth,
            &self.config.credentials(),
            self.obfuscator.as_deref(),
        )?;

        let mut channel = CommandChannel::new(transport, self.config.command_timeout());
        if let Some(payload) = payload {
            channel
                .command(Command::Login, &[Param::String(&payload)])
                .await?;
            tracing::info!(user = ?self.config.user, "Logged in");
        }

        Ok(Connection {
            channel,
            server_info,
            host: self.config.host,
        })
    }

    async fn resume<S>(self, stream: S, session: &SessionKey) -> Result<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut transport = FrameTransport::with_max_payload_size(stream, self.config.max_payload_size);
        transport.write_raw(&session.key).await?;
        tracing::info!(host = %session.host, port = session.port, "Attached to detached session");

        Ok(Connection {
            channel: CommandChannel::new(transport, self.config.command_timeout()),
            server_info: session.server_info.clone(),
            host: session.host.clone(),
        })
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("config", &self.config)
            .field("obfuscator", &self.obfuscator.is_some())
            .finish()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Handle for resuming a detached session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    /// Host the session lives on.
    pub host: String,
    /// Port the server listens on for this session.
    pub port: u16,
    /// Key sent in place of the handshake when attaching.
    pub key: [u8; SESSION_KEY_SIZE],
    /// Identification of the server that created the session.
    pub server_info: ServerInfo,
}

impl SessionKey {
    /// Read the port and key records of a detach response.
    fn from_response(items: Vec<DecodedItem>, host: String, server_info: ServerInfo) -> Result<Self> {
        let mut port = None;
        let mut key = None;
        for item in items {
            match item {
                DecodedItem::Int(p) if port.is_none() => port = Some(p),
                DecodedItem::Bytes(b) if key.is_none() => key = Some(b),
                other => {
                    return Err(RserveError::malformed(format!(
                        "unexpected {} in detach response",
                        other.kind()
                    )))
                }
            }
        }

        let port = port.ok_or_else(|| RserveError::malformed("detach response has no port"))?;
        let port = u16::try_from(port)
            .map_err(|_| RserveError::malformed(format!("detach response port {port} is out of range")))?;
        let key = key.ok_or_else(|| RserveError::malformed("detach response has no key"))?;
        let key: [u8; SESSION_KEY_SIZE] = key[..].try_into().map_err(|_| {
            RserveError::malformed(format!(
                "session key is {} bytes, expected {SESSION_KEY_SIZE}",
                key.len()
            ))
        })?;

        Ok(Self {
            host,
            port,
            key,
            server_info,
        })
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("key", &"<redacted>")
            .field("server_info", &self.server_info)
            .finish()
    }
}

/// An open Rserve session.
///
/// Every operation takes `&mut self`, so one connection carries one request
/// at a time. Share it between tasks behind a `tokio::sync::Mutex`.
/// Dropping the connection closes the stream.
#[derive(Debug)]
pub struct Connection<S> {
    channel: CommandChannel<S>,
    server_info: ServerInfo,
    host: String,
}

impl Connection<TcpStream> {
    /// Create a connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Parsed identification block of the server.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// State of the underlying command channel.
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Whether commands can still be sent.
    pub fn is_usable(&self) -> bool {
        self.channel.is_usable()
    }

    /// Evaluate `expr` and return its value.
    ///
    /// A response without records evaluates to NULL.
    pub async fn eval(&mut self, expr: &str) -> Result<Sexp> {
        let items = self
            .channel
            .command(Command::Eval, &[Param::String(expr)])
            .await?;
        first_sexp(items)
    }

    /// Evaluate `expr` and discard the value.
    pub async fn void_eval(&mut self, expr: &str) -> Result<()> {
        self.channel
            .command(Command::VoidEval, &[Param::String(expr)])
            .await?;
        Ok(())
    }

    /// Bind `value` to the symbol `name` in the session's global environment.
    ///
    /// Rserve cannot decode a scalar logical record, so every scalar `Bool`
    /// inside `value` is sent as a logical vector of length one. R sees
    /// no difference between the two.
    pub async fn assign(&mut self, name: &str, value: &Sexp) -> Result<()> {
        let value = server_form(value);
        self.channel
            .command(Command::AssignSexp, &[Param::String(name), Param::Sexp(&value)])
            .await?;
        Ok(())
    }

    /// Like [`assign`](Self::assign), but `name` is taken verbatim rather
    /// than parsed as an expression.
    pub async fn set_sexp(&mut self, name: &str, value: &Sexp) -> Result<()> {
        let value = server_form(value);
        self.channel
            .command(Command::SetSexp, &[Param::String(name), Param::Sexp(&value)])
            .await?;
        Ok(())
    }

    /// Read a whole file from the server's working directory.
    pub async fn read_file(&mut self, name: &str) -> Result<Bytes> {
        self.channel
            .command(Command::OpenFile, &[Param::String(name)])
            .await?;

        let mut data = BytesMut::new();
        loop {
            let chunk = self
                .channel
                .command_read_stream(Command::ReadFile, &[])
                .await?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }

        self.channel.command(Command::CloseFile, &[]).await?;
        tracing::debug!(file = name, len = data.len(), "Read file");
        Ok(data.freeze())
    }

    /// Create or truncate a file on the server and write `data` to it.
    pub async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.channel
            .command(Command::CreateFile, &[Param::String(name)])
            .await?;
        self.channel
            .command(Command::WriteFile, &[Param::Bytes(data)])
            .await?;
        self.channel.command(Command::CloseFile, &[]).await?;
        tracing::debug!(file = name, len = data.len(), "Wrote file");
        Ok(())
    }

    /// Delete a file on the server.
    pub async fn remove_file(&mut self, name: &str) -> Result<()> {
        self.channel
            .command(Command::RemoveFile, &[Param::String(name)])
            .await?;
        Ok(())
    }

    /// Set the string encoding the server uses for this session, e.g. `"utf8"`.
    pub async fn set_encoding(&mut self, encoding: &str) -> Result<()> {
        self.channel
            .command(Command::SetEncoding, &[Param::String(encoding)])
            .await?;
        Ok(())
    }

    /// Set the server's send buffer size for this session.
    pub async fn set_buffer_size(&mut self, bytes: u32) -> Result<()> {
        let size = i32::try_from(bytes).map_err(|_| {
            RserveError::InvalidOperation(format!("buffer size {bytes} exceeds the protocol limit"))
        })?;
        self.channel
            .command(Command::SetBufferSize, &[Param::Int(size)])
            .await?;
        Ok(())
    }

    /// Evaluate `expr` in the server's control process.
    pub async fn ctrl_eval(&mut self, expr: &str) -> Result<()> {
        self.channel
            .command(Command::CtrlEval, &[Param::String(expr)])
            .await?;
        Ok(())
    }

    /// Source the server-side file `path` in the control process.
    pub async fn ctrl_source(&mut self, path: &str) -> Result<()> {
        self.channel
            .command(Command::CtrlSource, &[Param::String(path)])
            .await?;
        Ok(())
    }

    /// Shut the server down through the control process.
    pub async fn ctrl_shutdown(mut self) -> Result<()> {
        self.channel.command(Command::CtrlShutdown, &[]).await?;
        tracing::info!(host = %self.host, "Requested control shutdown");
        self.channel.close().await
    }

    /// Shut the server down.
    pub async fn shutdown(mut self) -> Result<()> {
        self.channel.command(Command::Shutdown, &[]).await?;
        tracing::info!(host = %self.host, "Requested server shutdown");
        self.channel.close().await
    }

    /// Detach the session so it can be resumed later with
    /// [`ConnectionBuilder::attach`]. The server closes this connection.
    pub async fn detach(mut self) -> Result<SessionKey> {
        let items = self.channel.command(Command::DetachSession, &[]).await?;
        self.into_session_key(items).await
    }

    /// Start evaluating `expr` and detach without waiting for the value.
    pub async fn detached_void_eval(mut self, expr: &str) -> Result<SessionKey> {
        let items = self
            .channel
            .command(Command::DetachedVoidEval, &[Param::String(expr)])
            .await?;
        self.into_session_key(items).await
    }

    async fn into_session_key(mut self, items: Vec<DecodedItem>) -> Result<SessionKey> {
        let key = SessionKey::from_response(items, self.host.clone(), self.server_info.clone())?;
        tracing::info!(host = %key.host, port = key.port, "Detached session");
        // the server has already dropped its side
        let _ = self.channel.close().await;
        Ok(key)
    }

    /// Shut the stream down.
    pub async fn close(mut self) -> Result<()> {
        tracing::debug!(host = %self.host, "Closing connection");
        self.channel.close().await
    }
}

/// `value` with each scalar logical widened to a length-one vector.
fn server_form(value: &Sexp) -> Cow<'_, Sexp> {
    if has_scalar_bool(value) {
        Cow::Owned(widen_bools(value))
    } else {
        Cow::Borrowed(value)
    }
}

fn has_scalar_bool(value: &Sexp) -> bool {
    let in_data = match value.data() {
        SexpData::Bool(_) => true,
        SexpData::List(items) => items.iter().any(has_scalar_bool),
        _ => false,
    };
    in_data
        || value
            .attributes()
            .is_some_and(|attrs| attrs.iter().any(|(_, v)| has_scalar_bool(v)))
}

fn widen_bools(value: &Sexp) -> Sexp {
    let data = match value.data() {
        SexpData::Bool(b) => SexpData::ArrayBool(vec![*b]),
        SexpData::List(items) => SexpData::List(items.iter().map(widen_bools).collect()),
        other => other.clone(),
    };
    let mut out = Sexp::new(data);
    if let Some(attrs) = value.attributes() {
        out.set_attributes(
            attrs
                .iter()
                .map(|(name, v)| (name.to_owned(), widen_bools(v)))
                .collect(),
        );
    }
    out
}

fn first_sexp(items: Vec<DecodedItem>) -> Result<Sexp> {
    match items.into_iter().next() {
        Some(item) => item.into_sexp(),
        None => Ok(Sexp::null()),
    }
}
