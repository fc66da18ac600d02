//! Control module - identification handshake and login.
//!
//! Runs once per connection, before any command:
//!
//! 1. Server sends the 32-byte identification block
//! 2. Client checks signature and protocol ([`ServerInfo::parse`])
//! 3. If the block asks for it, client sends the login command with the
//!    payload from [`login_payload`]
//! 4. Commands may flow

mod auth;
mod handshake;

pub use auth::{login_payload, Credentials, PasswordObfuscator};
pub use handshake::{
    AuthMethod, ServerInfo, AUTH_CRYPT, AUTH_PLAIN, DEFAULT_SALT, HANDSHAKE_SIZE, PROTOCOL,
    SIGNATURE,
};
