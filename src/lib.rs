//! # rserve-client
//!
//! Async client for the Rserve QAP1 protocol.
//!
//! This crate lets Rust programs evaluate R expressions on a remote Rserve
//! server, exchange values with it, and move files to and from its working
//! directory.
//!
//! ## Architecture
//!
//! - **Values** ([`sexp`]): the tagged union of R values with NA sentinels,
//!   attributes, keyed access and dimensions
//! - **Codec** ([`codec`]): type-tagged binary records for parameters and
//!   response bodies
//! - **Framing** ([`protocol`], [`transport`]): 16-byte message headers over
//!   any async byte stream
//! - **Session** ([`Connection`]): handshake, login, and one command at a time
//!
//! ## Example
//!
//! ```no_run
//! use rserve_client::{Connection, Sexp};
//!
//! #[tokio::main]
//! async fn main() -> rserve_client::Result<()> {
//!     let mut conn = Connection::builder().connect().await?;
//!
//!     conn.assign("m", &Sexp::matrix_i32(&[vec![1, 2, 3], vec![4, 5, 6]])?).await?;
//!     let total = conn.eval("sum(m)").await?;
//!     println!("{total}");
//!
//!     conn.close().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod sexp;
pub mod transport;

mod channel;
mod client;

pub use channel::{ChannelState, CommandChannel};
pub use client::{Connection, ConnectionBuilder, SessionKey, TcpConnection, SESSION_KEY_SIZE};
pub use codec::DecodedItem;
pub use config::ConnectionConfig;
pub use control::{AuthMethod, Credentials, PasswordObfuscator, ServerInfo};
pub use error::{Result, RserveError};
pub use sexp::{Logical, Sexp, SexpData};
