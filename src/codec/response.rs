//! Decoding of successful response bodies.

use bytes::{Buf, Bytes};

use super::param::{DT_BYTESTREAM, DT_INT, DT_SEXP, DT_STRING};
use super::record::take_header;
use super::sexp::decode_sexp;
use crate::error::{Result, RserveError};
use crate::sexp::Sexp;

/// One record of a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedItem {
    /// An expression.
    Sexp(Sexp),
    /// A raw byte stream.
    Bytes(Bytes),
    /// A bare integer.
    Int(i32),
    /// A bare string.
    String(String),
}

impl DecodedItem {
    /// Kind of record, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedItem::Sexp(_) => "expression",
            DecodedItem::Bytes(_) => "byte stream",
            DecodedItem::Int(_) => "integer",
            DecodedItem::String(_) => "string",
        }
    }

    /// Take the expression, or fail if this record is something else.
    pub fn into_sexp(self) -> Result<Sexp> {
        match self {
            DecodedItem::Sexp(s) => Ok(s),
            other => Err(RserveError::malformed(format!(
                "expected an expression, got a {}",
                other.kind()
            ))),
        }
    }
}

/// Walk `body` record by record until it is exhausted.
///
/// Nothing is returned unless the whole body decodes.
pub fn decode_response_body(body: Bytes) -> Result<Vec<DecodedItem>> {
    let mut items = Vec::new();
    let mut rest = &body[..];
    while !rest.is_empty() {
        let (tag, len) = take_header(&mut rest)?;
        let offset = body.len() - rest.len();
        let payload = &rest[..len];
        let item = match tag {
            DT_SEXP => {
                let mut p = payload;
                let sexp = decode_sexp(&mut p)?;
                if !p.is_empty() {
                    return Err(RserveError::malformed(format!(
                        "{} stray bytes after the expression in a {len}-byte record",
                        p.len()
                    )));
                }
                DecodedItem::Sexp(sexp)
            }
            DT_BYTESTREAM => DecodedItem::Bytes(body.slice(offset..offset + len)),
            DT_INT => {
                if len != 4 {
                    return Err(RserveError::malformed(format!(
                        "integer record holds {len} bytes, expected 4"
                    )));
                }
                let mut p = payload;
                DecodedItem::Int(p.get_i32_le())
            }
            DT_STRING => {
                let end = payload.iter().position(|b| *b == 0).unwrap_or(len);
                DecodedItem::String(String::from_utf8_lossy(&payload[..end]).into_owned())
            }
            other => {
                return Err(RserveError::malformed(format!(
                    "unexpected parameter tag {other} in response"
                )))
            }
        };
        items.push(item);
        rest.advance(len);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::param::{encode_params, Param};

    #[test]
    fn test_decodes_records_in_order() {
        let value = Sexp::from(vec!["a", "b"]);
        let body = encode_params(&[
            Param::Sexp(&value),
            Param::Bytes(b"raw"),
            Param::Int(42),
            Param::String("hi"),
        ])
        .unwrap();
        let items = decode_response_body(body).unwrap();
        assert_eq!(
            items,
            vec![
                DecodedItem::Sexp(value),
                DecodedItem::Bytes(Bytes::from_static(b"raw")),
                DecodedItem::Int(42),
                DecodedItem::String("hi".into()),
            ]
        );
    }

    #[test]
    fn test_empty_body_has_no_items() {
        assert!(decode_response_body(Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_body_is_malformed() {
        let body = encode_params(&[Param::Sexp(&Sexp::from(vec![1.0, 2.0]))]).unwrap();
        let cut = body.slice(..body.len() - 3);
        assert!(matches!(
            decode_response_body(cut),
            Err(RserveError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let body = Bytes::from_static(&[0x3F, 0, 0, 0]);
        assert!(decode_response_body(body).is_err());
    }

    #[test]
    fn test_into_sexp_rejects_other_kinds() {
        assert!(DecodedItem::Int(1).into_sexp().is_err());
        assert_eq!(
            DecodedItem::Sexp(Sexp::from(1)).into_sexp().unwrap(),
            Sexp::from(1)
        );
    }

    #[test]
    fn test_record_longer_than_its_content_is_malformed() {
        // DT_SEXP of 12 bytes holding an 8-byte XT_INT and 4 stray bytes
        let body = Bytes::from_static(&[
            10, 12, 0, 0, 1, 4, 0, 0, 7, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF,
        ]);
        assert!(matches!(
            decode_response_body(body),
            Err(RserveError::MalformedResponse(_))
        ));

        let body = Bytes::from_static(&[DT_INT, 8, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            decode_response_body(body),
            Err(RserveError::MalformedResponse(_))
        ));
    }
}
