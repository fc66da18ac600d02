//! Expression (XT) records.
//!
//! Every [`Sexp`] variant has one encoding, chosen so that decoding gives
//! back an equal value:
//!
//! | variant       | tag              |
//! |---------------|------------------|
//! | `Null`        | `XT_NULL`        |
//! | `Bool`        | `XT_BOOL`        |
//! | `Int`         | `XT_INT`         |
//! | `Double`      | `XT_DOUBLE`      |
//! | `String`      | `XT_STR`         |
//! | `ArrayInt`    | `XT_ARRAY_INT`   |
//! | `ArrayDouble` | `XT_ARRAY_DOUBLE`|
//! | `ArrayString` | `XT_ARRAY_STR`   |
//! | `ArrayBool`   | `XT_ARRAY_BOOL`  |
//! | `List`        | `XT_VECTOR`      |
//!
//! Attributes travel as an `XT_LIST_TAG` pairlist placed between the header
//! and the payload, announced by [`XT_HAS_ATTR`].

use bytes::{Buf, BufMut, BytesMut};

use super::record::{pad4, put_header, take_header};
use crate::error::{Result, RserveError};
use crate::sexp::na::NA_STRING_BYTE;
use crate::sexp::{Attributes, Logical, Sexp, SexpData, NAMES};

pub const XT_NULL: u8 = 0;
pub const XT_INT: u8 = 1;
pub const XT_DOUBLE: u8 = 2;
pub const XT_STR: u8 = 3;
pub const XT_LANG: u8 = 4;
pub const XT_SYM: u8 = 5;
pub const XT_BOOL: u8 = 6;
pub const XT_S4: u8 = 7;
pub const XT_VECTOR: u8 = 16;
pub const XT_LIST: u8 = 17;
pub const XT_CLOS: u8 = 18;
pub const XT_SYMNAME: u8 = 19;
pub const XT_LIST_NOTAG: u8 = 20;
pub const XT_LIST_TAG: u8 = 21;
pub const XT_LANG_NOTAG: u8 = 22;
pub const XT_LANG_TAG: u8 = 23;
pub const XT_VECTOR_EXP: u8 = 26;
pub const XT_VECTOR_STR: u8 = 27;
pub const XT_ARRAY_INT: u8 = 32;
pub const XT_ARRAY_DOUBLE: u8 = 33;
pub const XT_ARRAY_STR: u8 = 34;
pub const XT_ARRAY_BOOL_UA: u8 = 35;
pub const XT_ARRAY_BOOL: u8 = 36;
pub const XT_RAW: u8 = 37;
pub const XT_ARRAY_CPLX: u8 = 38;
pub const XT_UNKNOWN: u8 = 48;

/// Flag: an attribute pairlist precedes the payload.
pub const XT_HAS_ATTR: u8 = 0x80;

const TAG_MASK: u8 = 0x3F;

/// Padding byte after the last element of a string array.
const STR_ARRAY_PAD: u8 = 0x01;
/// Padding byte after the last element of a logical array.
const BOOL_ARRAY_PAD: u8 = 0xFF;

// ----------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------

/// Append the XT record for `sexp` to `buf`.
///
/// Fails with `InvalidOperation` if a string or attribute name holds a NUL
/// byte, which the NUL-terminated wire form cannot carry.
pub fn encode_sexp(buf: &mut BytesMut, sexp: &Sexp) -> Result<()> {
    let mut body = BytesMut::new();
    let mut type_byte = encode_payload(&mut body, sexp.data())?;

    if let Some(attrs) = sexp.attributes().filter(|a| !a.is_empty()) {
        let mut with_attrs = BytesMut::with_capacity(body.len() + 16 * attrs.len());
        encode_attributes(&mut with_attrs, attrs)?;
        with_attrs.extend_from_slice(&body);
        body = with_attrs;
        type_byte |= XT_HAS_ATTR;
    }

    put_header(buf, type_byte, body.len());
    buf.extend_from_slice(&body);
    Ok(())
}

/// Encoded size of `sexp`, header included.
pub fn encoded_len(sexp: &Sexp) -> Result<usize> {
    let mut buf = BytesMut::new();
    encode_sexp(&mut buf, sexp)?;
    Ok(buf.len())
}

fn encode_attributes(buf: &mut BytesMut, attrs: &Attributes) -> Result<()> {
    let mut body = BytesMut::new();
    for (name, value) in attrs.iter() {
        encode_sexp(&mut body, value)?;
        let mut sym = BytesMut::new();
        put_cstring(&mut sym, Some(name))?;
        put_padding(&mut sym, 0);
        put_header(&mut body, XT_SYMNAME, sym.len());
        body.extend_from_slice(&sym);
    }
    put_header(buf, XT_LIST_TAG, body.len());
    buf.extend_from_slice(&body);
    Ok(())
}

/// Write the payload and return the tag describing it.
fn encode_payload(buf: &mut BytesMut, data: &SexpData) -> Result<u8> {
    let tag = match data {
        SexpData::Null => XT_NULL,
        SexpData::Bool(b) => {
            buf.put_u8(b.to_byte());
            put_padding(buf, 0);
            XT_BOOL
        }
        SexpData::Int(i) => {
            buf.put_i32_le(*i);
            XT_INT
        }
        SexpData::Double(d) => {
            buf.put_u64_le(d.to_bits());
            XT_DOUBLE
        }
        SexpData::String(s) => {
            put_cstring(buf, s.as_deref())?;
            put_padding(buf, 0);
            XT_STR
        }
        SexpData::ArrayInt(v) => {
            buf.reserve(v.len() * 4);
            for i in v {
                buf.put_i32_le(*i);
            }
            XT_ARRAY_INT
        }
        SexpData::ArrayDouble(v) => {
            buf.reserve(v.len() * 8);
            for d in v {
                buf.put_u64_le(d.to_bits());
            }
            XT_ARRAY_DOUBLE
        }
        SexpData::ArrayString(v) => {
            for s in v {
                put_cstring(buf, s.as_deref())?;
            }
            put_padding(buf, STR_ARRAY_PAD);
            XT_ARRAY_STR
        }
        SexpData::ArrayBool(v) => {
            buf.put_i32_le(v.len() as i32);
            for b in v {
                buf.put_u8(b.to_byte());
            }
            put_padding(buf, BOOL_ARRAY_PAD);
            XT_ARRAY_BOOL
        }
        SexpData::List(items) => {
            for item in items {
                encode_sexp(buf, item)?;
            }
            XT_VECTOR
        }
    };
    Ok(tag)
}

/// Reject strings the NUL-terminated wire form would split.
pub(crate) fn check_no_nul(s: &str) -> Result<()> {
    if s.contains('\0') {
        return Err(RserveError::InvalidOperation(format!(
            "string {s:?} contains a NUL byte and cannot be sent"
        )));
    }
    Ok(())
}

/// NUL-terminated string; NA is the lone `0xFF` byte.
fn put_cstring(buf: &mut BytesMut, s: Option<&str>) -> Result<()> {
    match s {
        Some(s) => {
            check_no_nul(s)?;
            buf.extend_from_slice(s.as_bytes());
        }
        None => buf.put_u8(NA_STRING_BYTE),
    }
    buf.put_u8(0);
    Ok(())
}

/// Pad to a multiple of 4 counted from the start of `buf`.
///
/// Payloads are always written into a fresh buffer, so this is the record
/// payload's own alignment.
fn put_padding(buf: &mut BytesMut, byte: u8) {
    buf.put_bytes(byte, pad4(buf.len()));
}

// ----------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------

/// Decode exactly one XT record from the front of `buf`, advancing it.
pub fn decode_sexp(buf: &mut &[u8]) -> Result<Sexp> {
    let (type_byte, len) = take_header(buf)?;
    let mut body = &buf[..len];
    buf.advance(len);

    let attributes = if type_byte & XT_HAS_ATTR != 0 {
        Some(decode_attributes(&mut body)?)
    } else {
        None
    };

    let mut sexp = decode_payload(type_byte & TAG_MASK, body)?;
    if let Some(attrs) = attributes {
        for (name, value) in attrs {
            sexp.set_attr(name, value);
        }
    }
    Ok(sexp)
}

fn decode_attributes(body: &mut &[u8]) -> Result<Attributes> {
    let pairlist = decode_sexp(body)?;
    let names = pairlist.names().unwrap_or_default();
    let SexpData::List(values) = pairlist.data() else {
        return Err(RserveError::malformed(format!(
            "attribute block is a {}, expected a tagged pairlist",
            pairlist.type_name()
        )));
    };
    if names.len() != values.len() {
        return Err(RserveError::malformed("attribute without a name"));
    }
    Ok(names
        .iter()
        .zip(values)
        .map(|(name, value)| (name.clone().unwrap_or_default(), value.clone()))
        .collect())
}

fn decode_payload(tag: u8, mut body: &[u8]) -> Result<Sexp> {
    let data = match tag {
        XT_NULL => SexpData::Null,
        XT_BOOL => {
            let b = body
                .first()
                .ok_or_else(|| RserveError::malformed("empty logical record"))?;
            SexpData::Bool(Logical::from_byte(*b))
        }
        XT_INT => SexpData::Int(fixed::<4>(body, "integer")?.get_i32_le()),
        XT_DOUBLE => SexpData::Double(f64::from_bits(fixed::<8>(body, "double")?.get_u64_le())),
        XT_STR | XT_SYMNAME => SexpData::String(read_cstring(body)),
        XT_SYM => {
            // printname is a nested expression
            let name = decode_sexp(&mut body)?;
            let name = name
                .as_string()
                .map_err(|_| RserveError::malformed("symbol without a printname"))?;
            SexpData::String(name.map(str::to_owned))
        }
        XT_ARRAY_INT => {
            check_multiple(body, 4, "integer array")?;
            SexpData::ArrayInt(body.chunks_exact(4).map(|mut c| c.get_i32_le()).collect())
        }
        XT_ARRAY_DOUBLE => {
            check_multiple(body, 8, "double array")?;
            SexpData::ArrayDouble(
                body.chunks_exact(8)
                    .map(|mut c| f64::from_bits(c.get_u64_le()))
                    .collect(),
            )
        }
        XT_ARRAY_STR => SexpData::ArrayString(read_string_array(body)),
        XT_ARRAY_BOOL | XT_ARRAY_BOOL_UA => SexpData::ArrayBool(read_bool_array(body)?),
        XT_VECTOR | XT_VECTOR_EXP | XT_LIST_NOTAG | XT_LANG_NOTAG => {
            SexpData::List(decode_all(body)?)
        }
        XT_VECTOR_STR => {
            let strings = decode_all(body)?
                .iter()
                .map(|s| s.as_string().map(|o| o.map(str::to_owned)))
                .collect::<Result<_>>()
                .map_err(|_| RserveError::malformed("string vector holds a non-string"))?;
            SexpData::ArrayString(strings)
        }
        XT_LIST_TAG | XT_LANG_TAG => return decode_tagged_list(body),
        // known to the protocol, no counterpart in the value model
        XT_LANG | XT_S4 | XT_LIST | XT_CLOS | XT_RAW | XT_ARRAY_CPLX | XT_UNKNOWN => SexpData::Null,
        other => {
            return Err(RserveError::malformed(format!(
                "unknown expression tag {other}"
            )))
        }
    };
    Ok(Sexp::new(data))
}

fn decode_all(mut body: &[u8]) -> Result<Vec<Sexp>> {
    let mut items = Vec::new();
    while !body.is_empty() {
        items.push(decode_sexp(&mut body)?);
    }
    Ok(items)
}

/// `(value, tag)` pairs become a list named by the tags.
fn decode_tagged_list(mut body: &[u8]) -> Result<Sexp> {
    let mut values = Vec::new();
    let mut names = Vec::new();
    while !body.is_empty() {
        values.push(decode_sexp(&mut body)?);
        if body.is_empty() {
            return Err(RserveError::malformed("tagged list value without a tag"));
        }
        let tag = decode_sexp(&mut body)?;
        let name = tag.as_string().ok().flatten().unwrap_or_default();
        names.push(Some(name.to_owned()));
    }
    Ok(Sexp::from(values).with_attr(NAMES, Sexp::from(names)))
}

fn fixed<'a, const N: usize>(body: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if body.len() != N {
        return Err(RserveError::malformed(format!(
            "{what} record holds {} bytes, expected {N}",
            body.len()
        )));
    }
    Ok(body)
}

fn check_multiple(body: &[u8], size: usize, what: &str) -> Result<()> {
    if body.len() % size != 0 {
        return Err(RserveError::malformed(format!(
            "{what} length {} is not a multiple of {size}",
            body.len()
        )));
    }
    Ok(())
}

fn decode_string(raw: &[u8]) -> Option<String> {
    if raw == [NA_STRING_BYTE] {
        None
    } else {
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}

/// Up to the first NUL, or the whole payload if there is none.
fn read_cstring(body: &[u8]) -> Option<String> {
    let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
    decode_string(&body[..end])
}

/// NUL-terminated elements. Bytes after the last NUL are padding.
fn read_string_array(body: &[u8]) -> Vec<Option<String>> {
    let mut out = Vec::new();
    let mut rest = body;
    while let Some(end) = rest.iter().position(|b| *b == 0) {
        out.push(decode_string(&rest[..end]));
        rest = &rest[end + 1..];
    }
    out
}

fn read_bool_array(mut body: &[u8]) -> Result<Vec<Logical>> {
    if body.remaining() < 4 {
        return Err(RserveError::malformed("truncated logical array"));
    }
    let n = body.get_i32_le();
    let n = usize::try_from(n)
        .map_err(|_| RserveError::malformed(format!("negative logical count {n}")))?;
    if n > body.len() {
        return Err(RserveError::malformed(format!(
            "logical array of {n} elements in {} bytes",
            body.len()
        )));
    }
    Ok(body[..n].iter().map(|b| Logical::from_byte(*b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::{CLASS, DIM, NA_DOUBLE, NA_INTEGER};

    fn roundtrip(sexp: &Sexp) -> Sexp {
        let mut buf = BytesMut::new();
        encode_sexp(&mut buf, sexp).unwrap();
        assert_eq!(buf.len(), encoded_len(sexp).unwrap());
        let mut slice = &buf[..];
        let decoded = decode_sexp(&mut slice).unwrap();
        assert!(slice.is_empty(), "trailing bytes after decode");
        decoded
    }

    #[test]
    fn test_double_array_with_na_roundtrips() {
        let v = Sexp::from(vec![1.0, NA_DOUBLE, 3.5]);
        let back = roundtrip(&v);
        assert_eq!(back, v);
        assert!(back.element(1).unwrap().is_na().unwrap());
        assert_eq!(back.element(0).unwrap().as_double().unwrap(), 1.0);
        assert_eq!(back.element(2).unwrap().as_double().unwrap(), 3.5);
    }

    #[test]
    fn test_every_variant_roundtrips() {
        let values = vec![
            Sexp::null(),
            Sexp::from(true),
            Sexp::na_bool(),
            Sexp::from(-7),
            Sexp::na_int(),
            Sexp::from(2.25),
            Sexp::na_double(),
            Sexp::from("héllo"),
            Sexp::from(""),
            Sexp::na_string(),
            Sexp::from(vec![1, NA_INTEGER, 3]),
            Sexp::from(Vec::<f64>::new()),
            Sexp::from(vec![Some("a".to_owned()), None, Some(String::new())]),
            Sexp::from(vec![Logical::True, Logical::Na, Logical::False]),
            Sexp::from(vec![Sexp::from(1), Sexp::from(vec!["x"]), Sexp::null()]),
        ];
        for v in &values {
            assert_eq!(&roundtrip(v), v, "{v}");
        }
    }

    #[test]
    fn test_attributes_roundtrip_in_order() {
        let m = Sexp::matrix_f64(&[vec![1.0, 2.0], vec![3.0, 4.0]])
            .unwrap()
            .with_attr(CLASS, Sexp::from(vec!["matrix"]));
        let back = roundtrip(&m);
        assert_eq!(back, m);
        let keys: Vec<_> = back.attributes().unwrap().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![DIM, CLASS]);
    }

    #[test]
    fn test_nested_keyed_list_roundtrips() {
        let inner = Sexp::from_pairs([("n", Sexp::from(1))]);
        let outer = Sexp::from_pairs([("inner", inner), ("s", Sexp::from(vec!["a", "b"]))]);
        assert_eq!(roundtrip(&outer), outer);
    }

    #[test]
    fn test_string_array_layout() {
        let mut buf = BytesMut::new();
        encode_sexp(&mut buf, &Sexp::from(vec![Some("ab".to_owned()), None])).unwrap();
        // "ab\0" + 0xFF "\0" = 5 bytes, padded with 0x01 to 8
        assert_eq!(
            &buf[..],
            &[XT_ARRAY_STR, 8, 0, 0, b'a', b'b', 0, 0xFF, 0, 1, 1, 1]
        );
    }

    #[test]
    fn test_bool_array_layout() {
        let mut buf = BytesMut::new();
        encode_sexp(&mut buf, &Sexp::from(vec![true, false])).unwrap();
        assert_eq!(
            &buf[..],
            &[XT_ARRAY_BOOL, 8, 0, 0, 2, 0, 0, 0, 1, 0, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_tagged_pairlist_decodes_to_named_list() {
        let mut buf = BytesMut::new();
        let mut body = BytesMut::new();
        encode_sexp(&mut body, &Sexp::from(vec![1])).unwrap();
        put_header(&mut body, XT_SYMNAME, 4);
        body.extend_from_slice(b"x\0\0\0");
        put_header(&mut buf, XT_LIST_TAG, body.len());
        buf.extend_from_slice(&body);

        let list = decode_sexp(&mut &buf[..]).unwrap();
        assert_eq!(list.keys().unwrap(), vec!["x"]);
        assert_eq!(list.get_by_name("x").unwrap(), Sexp::from(vec![1]));
    }

    #[test]
    fn test_unrepresentable_tags_decode_to_null() {
        for tag in [XT_CLOS, XT_S4, XT_RAW, XT_UNKNOWN] {
            let buf = [tag, 4, 0, 0, 9, 9, 9, 9];
            assert!(decode_sexp(&mut &buf[..]).unwrap().is_null());
        }
    }

    #[test]
    fn test_malformed_inputs() {
        let cases: [&[u8]; 7] = [
            // unknown tag
            &[60, 0, 0, 0],
            // length beyond buffer
            &[XT_ARRAY_INT, 8, 0, 0, 1, 0, 0, 0],
            // ragged integer array
            &[XT_ARRAY_INT, 3, 0, 0, 1, 0, 0],
            // truncated scalar
            &[XT_DOUBLE, 4, 0, 0, 0, 0, 0, 0],
            // logical count exceeds payload
            &[XT_ARRAY_BOOL, 4, 0, 0, 9, 0, 0, 0],
            // integer record longer than its value
            &[XT_INT, 8, 0, 0, 7, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF],
            // double record longer than its value
            &[XT_DOUBLE, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F, 1, 2, 3, 4],
        ];
        for case in cases {
            assert!(
                matches!(
                    decode_sexp(&mut &case[..]),
                    Err(RserveError::MalformedResponse(_))
                ),
                "{case:?}"
            );
        }
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let cases = [
            Sexp::from("a\0b"),
            Sexp::from(vec!["ok", "a\0b"]),
            Sexp::from(vec![Sexp::from(vec!["x\0"])]),
            Sexp::from(1).with_attr("bad\0name", Sexp::from(2)),
        ];
        for case in &cases {
            let mut buf = BytesMut::new();
            assert!(
                matches!(
                    encode_sexp(&mut buf, case),
                    Err(RserveError::InvalidOperation(_))
                ),
                "{case}"
            );
        }
    }
}
