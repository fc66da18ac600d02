//! Frame struct with typed accessors.
//!
//! Represents a complete message with header and body.
//! Uses `bytes::Bytes` for zero-copy body sharing.
//!
//! # Example
//!
//! ```
//! use rserve_client::protocol::{status, Frame, Header};
//! use bytes::Bytes;
//!
//! let header = Header::new(status::RESP_OK, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert!(frame.is_ok());
//! assert_eq!(frame.body(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol message.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame from header and body.
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take the body.
    #[inline]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Get the command or status word.
    #[inline]
    pub fn command(&self) -> u32 {
        self.header.command
    }

    /// Check if this is a success response.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.header.is_ok()
    }

    /// Check if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.is_error()
    }
}

/// Build a complete message as a single byte vector.
///
/// Encodes a header for `command` with the body length and appends the
/// body, so the message can go out in one write.
///
/// # Example
///
/// ```
/// use rserve_client::protocol::build_frame;
///
/// let bytes = build_frame(0x003, b"body");
/// assert_eq!(bytes.len(), 16 + 4);
/// ```
pub fn build_frame(command: u32, body: &[u8]) -> Vec<u8> {
    let header = Header::new(command, body.len() as u64);
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}
