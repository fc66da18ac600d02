//! Missing-value (NA) sentinels.
//!
//! R marks a missing value with a reserved bit pattern per type rather than
//! a separate flag:
//!
//! ```text
//! integer  i32::MIN
//! double   0x7FF0_0000_0000_07A2 (a NaN payload)
//! string   None (0xFF on the wire)
//! logical  Logical::Na (2 on the wire)
//! ```

use std::fmt;

/// NA integer sentinel.
pub const NA_INTEGER: i32 = i32::MIN;

/// Bit pattern of the NA double.
pub const NA_DOUBLE_BITS: u64 = 0x7FF0_0000_0000_07A2;

/// NA double sentinel.
pub const NA_DOUBLE: f64 = f64::from_bits(NA_DOUBLE_BITS);

/// Wire byte for NA in logical vectors.
pub const NA_LOGICAL_BYTE: u8 = 2;

/// Wire byte for an NA string element.
pub const NA_STRING_BYTE: u8 = 0xFF;

/// Check an integer against the NA sentinel.
#[inline]
pub fn is_na_int(x: i32) -> bool {
    x == NA_INTEGER
}

/// Check a double against the NA sentinel.
///
/// Only the low 32 bits are compared, as R does, so that NA survives
/// arithmetic that quiets the NaN.
#[inline]
pub fn is_na_double(x: f64) -> bool {
    x.is_nan() && (x.to_bits() & 0xFFFF_FFFF) == (NA_DOUBLE_BITS & 0xFFFF_FFFF)
}

/// Compare two doubles, treating identical NaN payloads as equal.
#[inline]
pub(crate) fn doubles_equal(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        a.to_bits() == b.to_bits()
    } else {
        a == b
    }
}

/// Tri-state logical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logical {
    /// FALSE.
    False,
    /// TRUE.
    True,
    /// Missing.
    Na,
}

impl Logical {
    /// Decode a wire byte. Anything other than 0 or 1 is NA.
    #[inline]
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Logical::False,
            1 => Logical::True,
            _ => Logical::Na,
        }
    }

    /// Encode to the wire byte.
    #[inline]
    pub fn to_byte(self) -> u8 {
        match self {
            Logical::False => 0,
            Logical::True => 1,
            Logical::Na => NA_LOGICAL_BYTE,
        }
    }

    /// Whether this is NA.
    #[inline]
    pub fn is_na(self) -> bool {
        self == Logical::Na
    }

    /// Convert to `bool`, `None` for NA.
    #[inline]
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Logical::False => Some(false),
            Logical::True => Some(true),
            Logical::Na => None,
        }
    }
}

impl From<bool> for Logical {
    fn from(b: bool) -> Self {
        if b {
            Logical::True
        } else {
            Logical::False
        }
    }
}

impl From<Option<bool>> for Logical {
    fn from(b: Option<bool>) -> Self {
        b.map_or(Logical::Na, Logical::from)
    }
}

impl fmt::Display for Logical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Logical::False => "FALSE",
            Logical::True => "TRUE",
            Logical::Na => "NA",
        })
    }
}
