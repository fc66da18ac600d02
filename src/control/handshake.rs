//! Server identification block.
//!
//! Immediately after connecting, the server sends 32 bytes read as eight
//! 4-byte ASCII tokens:
//!
//! ```text
//! Rsrv 0103 QAP1 ARpt ---- ---- ---- ----
//! │    │    │    └ optional capability tokens (auth, key)
//! │    │    └ protocol
//! │    └ version
//! └ signature
//! ```
//!
//! # Example
//!
//! ```
//! use rserve_client::control::{AuthMethod, ServerInfo};
//!
//! let info = ServerInfo::parse(b"Rsrv0103QAP1\r\n\r\n--------------\r\n").unwrap();
//! assert_eq!(info.version, "0103");
//! assert_eq!(info.auth, AuthMethod::None);
//! ```

use serde::Serialize;

use crate::error::{Result, RserveError};

/// Size of the identification block.
pub const HANDSHAKE_SIZE: usize = 32;

/// Server signature token.
pub const SIGNATURE: &str = "Rsrv";
/// The only protocol this client speaks.
pub const PROTOCOL: &str = "QAP1";
/// Capability token: plaintext login required.
pub const AUTH_PLAIN: &str = "ARpt";
/// Capability token: obfuscated login required.
pub const AUTH_CRYPT: &str = "ARuc";
/// Salt used when the server requires obfuscated login without a key token.
pub const DEFAULT_SALT: &str = "rs";

const TOKEN_SIZE: usize = 4;

/// Login flow required by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "method")]
pub enum AuthMethod {
    /// No login.
    None,
    /// `user\npassword` in the clear.
    Plain,
    /// Password transformed with the salt before sending.
    Crypt {
        /// Salt taken from the key token.
        salt: String,
    },
}

/// Parsed identification block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Version token, e.g. `"0103"`.
    pub version: String,
    /// Protocol token, always `"QAP1"` once parsed.
    pub protocol: String,
    /// Required login flow.
    pub auth: AuthMethod,
    /// All eight tokens as received.
    pub tokens: Vec<String>,
}

impl ServerInfo {
    /// Parse and validate the identification block.
    ///
    /// Fails with `ProtocolViolation` on a wrong signature and with
    /// `UnsupportedProtocol` on any protocol other than QAP1.
    pub fn parse(block: &[u8; HANDSHAKE_SIZE]) -> Result<Self> {
        let tokens: Vec<String> = block
            .chunks_exact(TOKEN_SIZE)
            .map(|t| String::from_utf8_lossy(t).into_owned())
            .collect();

        if tokens[0] != SIGNATURE {
            return Err(RserveError::ProtocolViolation(format!(
                "expected server signature {SIGNATURE:?}, got {:?}",
                tokens[0]
            )));
        }
        if tokens[2] != PROTOCOL {
            return Err(RserveError::UnsupportedProtocol(format!(
                "server speaks {:?}, only {PROTOCOL} is supported",
                tokens[2]
            )));
        }

        let has = |token: &str| tokens.iter().any(|t| t == token);
        let auth = if has(AUTH_CRYPT) {
            let salt = tokens
                .iter()
                .find_map(|t| t.strip_prefix('K'))
                .unwrap_or(DEFAULT_SALT)
                .to_owned();
            AuthMethod::Crypt { salt }
        } else if has(AUTH_PLAIN) {
            AuthMethod::Plain
        } else {
            AuthMethod::None
        };

        Ok(Self {
            version: tokens[1].clone(),
            protocol: tokens[2].clone(),
            auth,
            tokens,
        })
    }

    /// Whether a login must follow the handshake.
    pub fn requires_auth(&self) -> bool {
        self.auth != AuthMethod::None
    }
}
