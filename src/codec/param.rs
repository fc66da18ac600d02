//! Parameter (DT) records carried in command bodies.

use bytes::{BufMut, Bytes, BytesMut};

use super::record::{pad4, put_header};
use super::sexp::{check_no_nul, encode_sexp};
use crate::error::Result;
use crate::sexp::Sexp;

pub const DT_INT: u8 = 1;
pub const DT_CHAR: u8 = 2;
pub const DT_DOUBLE: u8 = 3;
pub const DT_STRING: u8 = 4;
pub const DT_BYTESTREAM: u8 = 5;
pub const DT_SEXP: u8 = 10;
pub const DT_ARRAY: u8 = 11;

/// One command parameter.
#[derive(Debug, Clone, Copy)]
pub enum Param<'a> {
    /// 32-bit integer.
    Int(i32),
    /// NUL-terminated string, padded to 4 bytes.
    String(&'a str),
    /// Raw bytes passed through unmodified.
    Bytes(&'a [u8]),
    /// Serialized expression.
    Sexp(&'a Sexp),
}

impl<'a> From<&'a str> for Param<'a> {
    fn from(s: &'a str) -> Self {
        Param::String(s)
    }
}

impl<'a> From<&'a Sexp> for Param<'a> {
    fn from(s: &'a Sexp) -> Self {
        Param::Sexp(s)
    }
}

impl From<i32> for Param<'_> {
    fn from(i: i32) -> Self {
        Param::Int(i)
    }
}

/// Append the DT record for `param` to `buf`.
///
/// Strings holding a NUL byte are rejected with `InvalidOperation`.
pub fn encode_param(buf: &mut BytesMut, param: &Param<'_>) -> Result<()> {
    match param {
        Param::Int(i) => {
            put_header(buf, DT_INT, 4);
            buf.put_i32_le(*i);
        }
        Param::String(s) => {
            check_no_nul(s)?;
            let len = s.len() + 1;
            let padded = len + pad4(len);
            put_header(buf, DT_STRING, padded);
            buf.extend_from_slice(s.as_bytes());
            buf.put_bytes(0, padded - s.len());
        }
        Param::Bytes(b) => {
            put_header(buf, DT_BYTESTREAM, b.len());
            buf.extend_from_slice(b);
        }
        Param::Sexp(sexp) => {
            let mut body = BytesMut::new();
            encode_sexp(&mut body, sexp)?;
            put_header(buf, DT_SEXP, body.len());
            buf.extend_from_slice(&body);
        }
    }
    Ok(())
}

/// Concatenate the records for a full command body.
pub fn encode_params(params: &[Param<'_>]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    for param in params {
        encode_param(&mut buf, param)?;
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RserveError;

    fn encode(param: Param<'_>) -> Vec<u8> {
        encode_params(&[param]).unwrap().to_vec()
    }

    #[test]
    fn test_string_is_nul_terminated_and_padded() {
        assert_eq!(encode(Param::String("abc")), [DT_STRING, 4, 0, 0, b'a', b'b', b'c', 0]);
        assert_eq!(
            encode(Param::String("abcd")),
            [DT_STRING, 8, 0, 0, b'a', b'b', b'c', b'd', 0, 0, 0, 0]
        );
        assert_eq!(encode(Param::String("")), [DT_STRING, 4, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_int_and_bytes() {
        assert_eq!(encode(Param::Int(-2)), [DT_INT, 4, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode(Param::Bytes(b"xyz")), [DT_BYTESTREAM, 3, 0, 0, b'x', b'y', b'z']);
    }

    #[test]
    fn test_sexp_param_wraps_expression() {
        let bytes = encode(Param::Sexp(&Sexp::from(7)));
        assert_eq!(bytes, [DT_SEXP, 8, 0, 0, 1, 4, 0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn test_large_bytestream_uses_extended_header() {
        let big = vec![0u8; 0x100_0000];
        let bytes = encode(Param::Bytes(&big));
        assert_eq!(&bytes[..8], &[DT_BYTESTREAM | 0x40, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(bytes.len(), 8 + big.len());
    }

    #[test]
    fn test_params_concatenate() {
        let value = Sexp::from(vec![1.5]);
        let body = encode_params(&["x".into(), (&value).into()]).unwrap();
        assert_eq!(&body[..8], &[DT_STRING, 4, 0, 0, b'x', 0, 0, 0]);
        assert_eq!(body[8], DT_SEXP);
    }

    #[test]
    fn test_string_with_nul_is_rejected() {
        let err = encode_params(&[Param::String("ann\0pw")]).unwrap_err();
        assert!(matches!(err, RserveError::InvalidOperation(_)));

        let value = Sexp::from(vec!["a\0b"]);
        assert!(encode_params(&[Param::Int(1), Param::Sexp(&value)]).is_err());
    }
}
