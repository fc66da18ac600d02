//! Codec module - type-tagged records inside message bodies.
//!
//! Two record families share one header layout (see `record`):
//!
//! - parameter records ([`Param`]) make up command and response bodies
//! - expression records serialize a [`Sexp`](crate::sexp::Sexp), nested
//!   inside a `DT_SEXP` parameter
//!
//! # Example
//!
//! ```
//! use rserve_client::codec::{decode_response_body, encode_params, DecodedItem, Param};
//! use rserve_client::Sexp;
//!
//! let value = Sexp::from(vec![1.0, 2.5]);
//! let body = encode_params(&[Param::Sexp(&value)]).unwrap();
//! let items = decode_response_body(body).unwrap();
//! assert_eq!(items, vec![DecodedItem::Sexp(value)]);
//! ```

mod param;
mod record;
mod response;
mod sexp;

pub use param::{
    encode_param, encode_params, Param, DT_ARRAY, DT_BYTESTREAM, DT_CHAR, DT_DOUBLE, DT_INT,
    DT_SEXP, DT_STRING,
};
pub use record::{LARGE_FLAG, SHORT_MAX_LEN};
pub use response::{decode_response_body, DecodedItem};
pub use sexp::{decode_sexp, encode_sexp, encoded_len, XT_HAS_ATTR};
