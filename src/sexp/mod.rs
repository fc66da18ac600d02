//! Value model for R expressions.
//!
//! [`Sexp`] is the in-memory form of everything exchanged with the server:
//! scalars, vectors, lists, and their attributes. Missing values use the
//! sentinels in [`na`]. Conversion to and from native Rust and JSON values
//! lives in `native`.

mod attributes;
pub mod na;
mod native;
mod value;

pub use attributes::{Attributes, CLASS, DIM, NAMES, ROW_NAMES};
pub use na::{is_na_double, is_na_int, Logical, NA_DOUBLE, NA_INTEGER};
pub use value::{Sexp, SexpData};
