//! Error types for rserve-client.

use thiserror::Error;

/// Main error type for all Rserve operations.
#[derive(Debug, Error)]
pub enum RserveError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading and native conversion).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handshake signature mismatch or an ill-formed response header.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Server speaks a protocol variant this client does not.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Server requires authentication but no user or password was given.
    #[error("Missing credentials: {0} is required by the server")]
    MissingCredentials(&'static str),

    /// Server requires an authentication method the client cannot perform.
    #[error("Unsupported authentication: {0}")]
    UnsupportedAuth(String),

    /// Server answered a command with an error status.
    #[error("Server rejected command with code {code:#04x}{}", describe(.code))]
    ServerRejected {
        /// Error code taken from the response status word.
        code: u8,
    },

    /// Response body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connect or command deadline elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// An earlier failure left the command channel out of sync with the stream.
    #[error("Command channel is broken and must be closed")]
    ChannelBroken,

    /// The value cannot be coerced to the requested type.
    #[error("Type mismatch: cannot use {found} as {expected}")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Variant actually held.
        found: &'static str,
    },

    /// The operation is not defined for this value.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Index or coordinate out of range.
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Length of the indexed axis.
        len: usize,
    },

    /// Keyed lookup found no matching name.
    #[error("Key not found: {0:?}")]
    KeyNotFound(String),

    /// A native value has a shape with no matching variant.
    #[error("Cannot convert native value: {0}")]
    Unconvertible(String),
}

impl RserveError {
    /// Whether the connection can no longer be used after this error.
    ///
    /// Value-model errors and server rejections are local to the call;
    /// transport and framing errors are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RserveError::Io(_)
                | RserveError::ProtocolViolation(_)
                | RserveError::UnsupportedProtocol(_)
                | RserveError::MissingCredentials(_)
                | RserveError::UnsupportedAuth(_)
                | RserveError::MalformedResponse(_)
                | RserveError::ConnectionClosed
                | RserveError::Timeout
                | RserveError::ChannelBroken
        )
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        RserveError::MalformedResponse(msg.into())
    }
}

/// Human-readable description of a server error code.
pub fn error_code_description(code: u8) -> Option<&'static str> {
    Some(match code {
        0x41 => "authentication failed",
        0x42 => "connection broken",
        0x43 => "invalid command",
        0x44 => "invalid parameter",
        0x45 => "R error during evaluation",
        0x46 => "I/O error on the server",
        0x47 => "no file is open",
        0x48 => "access denied",
        0x49 => "unsupported command",
        0x4a => "unknown command",
        0x4b => "incoming data too big",
        0x4c => "requested object too big",
        0x4d => "server out of memory",
        0x4e => "control pipe closed",
        0x50 => "session is busy",
        0x51 => "unable to detach session",
        0x61 => "feature disabled",
        0x62 => "feature unavailable",
        0x63 => "cryptographic error",
        0x64 => "connection closed for security reasons",
        _ => return None,
    })
}

fn describe(code: &u8) -> String {
    error_code_description(*code)
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Result type alias using RserveError.
pub type Result<T> = std::result::Result<T, RserveError>;
