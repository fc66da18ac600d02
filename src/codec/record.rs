//! Type-tagged record header shared by parameter (DT) and expression (XT)
//! records.
//!
//! ```text
//! short form (length <= 0xFF_FFFF)      large form
//! ┌──────┬──────────────┐               ┌────────────┬──────────────┬──────────────┐
//! │ type │ length 0..24 │               │ type|LARGE │ length 0..24 │ length 24..56│
//! │ 1 B  │ 3 bytes LE   │               │ 1 B        │ 3 bytes LE   │ 4 bytes LE   │
//! └──────┴──────────────┘               └────────────┴──────────────┴──────────────┘
//! ```
//!
//! The large form is only produced and accepted here; callers never see it.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, RserveError};

/// Flag in the type byte selecting the 8-byte header.
pub const LARGE_FLAG: u8 = 0x40;

/// Longest payload the 4-byte header can describe.
pub const SHORT_MAX_LEN: usize = 0xFF_FFFF;

/// Longest payload the 8-byte header can describe.
const LARGE_MAX_LEN: u64 = (1 << 56) - 1;

/// Size of the header that will precede a payload of `len` bytes.
#[inline]
pub fn header_len(len: usize) -> usize {
    if len > SHORT_MAX_LEN {
        8
    } else {
        4
    }
}

/// Write a record header. `type_byte` must not carry [`LARGE_FLAG`].
pub fn put_header(buf: &mut BytesMut, type_byte: u8, len: usize) {
    debug_assert!(type_byte & LARGE_FLAG == 0);
    let len = len as u64;
    debug_assert!(len <= LARGE_MAX_LEN);
    if len > SHORT_MAX_LEN as u64 {
        buf.put_u8(type_byte | LARGE_FLAG);
        buf.put_uint_le(len & 0xFF_FFFF, 3);
        buf.put_u32_le((len >> 24) as u32);
    } else {
        buf.put_u8(type_byte);
        buf.put_uint_le(len, 3);
    }
}

/// Read a record header and check its payload fits in what remains.
///
/// Returns the type byte with [`LARGE_FLAG`] cleared, and the payload
/// length.
pub fn take_header(buf: &mut &[u8]) -> Result<(u8, usize)> {
    if buf.remaining() < 4 {
        return Err(RserveError::malformed(format!(
            "truncated record header: {} bytes left",
            buf.remaining()
        )));
    }
    let type_byte = buf.get_u8();
    let mut len = buf.get_uint_le(3);
    if type_byte & LARGE_FLAG != 0 {
        if buf.remaining() < 4 {
            return Err(RserveError::malformed("truncated large record header"));
        }
        len |= u64::from(buf.get_u32_le()) << 24;
    }
    let len = usize::try_from(len)
        .map_err(|_| RserveError::malformed(format!("record length {len} too large")))?;
    if len > buf.remaining() {
        return Err(RserveError::malformed(format!(
            "record length {len} exceeds remaining {} bytes",
            buf.remaining()
        )));
    }
    Ok((type_byte & !LARGE_FLAG, len))
}

/// Padding needed to bring `len` to a multiple of 4.
#[inline]
pub fn pad4(len: usize) -> usize {
    (4 - len % 4) % 4
}
