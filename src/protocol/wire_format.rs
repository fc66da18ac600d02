//! Wire format encoding and decoding.
//!
//! Implements the 16-byte message header:
//! ```text
//! ┌────────────────┬──────────────┬──────────────┬──────────────┐
//! │ Command/Status │ Length low   │ Data offset  │ Length high  │
//! │ 4 bytes        │ 4 bytes      │ 4 bytes      │ 4 bytes      │
//! │ uint32 LE      │ uint32 LE    │ uint32 LE    │ uint32 LE    │
//! └────────────────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. Requests carry a command
//! code in the first field; responses carry a status word.

use crate::error::{Result, RserveError};

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_SIZE: usize = 16;

/// Default maximum body size accepted from the server (1 GiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1 << 30;

/// Status constants for response headers.
pub mod status {
    /// Set on every response.
    pub const CMD_RESP: u32 = 0x10000;
    /// Command succeeded.
    pub const RESP_OK: u32 = CMD_RESP | 0x0001;
    /// Command failed; the error code is in bits 24..=30.
    pub const RESP_ERR: u32 = CMD_RESP | 0x0002;

    /// Bits identifying the response kind, below the error code.
    pub const KIND_MASK: u32 = 0x00FF_FFFF;

    /// Extract the error code from a status word.
    #[inline]
    pub fn error_code(status: u32) -> u8 {
        ((status >> 24) & 0x7F) as u8
    }

    /// Build an error status carrying `code`.
    #[inline]
    pub fn error_with_code(code: u8) -> u32 {
        RESP_ERR | (u32::from(code & 0x7F) << 24)
    }
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command code (requests) or status word (responses).
    pub command: u32,
    /// Body length in bytes.
    pub length: u64,
    /// Offset of the data within the body. Always 0 in practice.
    pub data_offset: u32,
}

impl Header {
    /// Create a new header with a zero data offset.
    pub fn new(command: u32, length: u64) -> Self {
        Self {
            command,
            length,
            data_offset: 0,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use rserve_client::protocol::Header;
    ///
    /// let header = Header::new(0x003, 8);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 16);
    /// assert_eq!(&bytes[..8], &[3, 0, 0, 0, 8, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (16 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.command.to_le_bytes());
        buf[4..8].copy_from_slice(&(self.length as u32).to_le_bytes());
        buf[8..12].copy_from_slice(&self.data_offset.to_le_bytes());
        buf[12..16].copy_from_slice(&((self.length >> 32) as u32).to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Some(Self {
            command: word(0),
            length: u64::from(word(4)) | (u64::from(word(12)) << 32),
            data_offset: word(8),
        })
    }

    /// Validate a header read from the server.
    ///
    /// Checks:
    /// - The response bit is set
    /// - The status is OK or ERR
    /// - Body length doesn't exceed max
    pub fn validate_response(&self, max_payload_size: u64) -> Result<()> {
        if !self.is_response() {
            return Err(RserveError::ProtocolViolation(format!(
                "expected a response header, got command {:#x}",
                self.command
            )));
        }

        if !self.is_ok() && !self.is_error() {
            return Err(RserveError::ProtocolViolation(format!(
                "unknown response status {:#x}",
                self.command
            )));
        }

        if self.length > max_payload_size {
            return Err(RserveError::ProtocolViolation(format!(
                "Body size {} exceeds maximum {}",
                self.length, max_payload_size
            )));
        }

        Ok(())
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.command & status::CMD_RESP != 0
    }

    /// Check if this is a success response.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.command & status::KIND_MASK == status::RESP_OK
    }

    /// Check if this is an error response.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.command & status::KIND_MASK == status::RESP_ERR
    }

    /// Error code of an error response.
    #[inline]
    pub fn error_code(&self) -> u8 {
        status::error_code(self.command)
    }
}
