//! The `Sexp` value type.
//!
//! A [`Sexp`] pairs a [`SexpData`] payload from a closed set of variants
//! with an optional, lazily created [`Attributes`] map. Every accessor is
//! an exhaustive match over the variants: an arm either implements the
//! operation or returns [`RserveError::TypeMismatch`].
//!
//! Two attributes change behaviour:
//! - `names` gives positions a lookup key. Every mutating operation keeps
//!   it the same length as the data.
//! - `dim` makes a flat vector addressable as a column-major array.

use std::fmt;

use super::attributes::{Attributes, DIM, NAMES};
use super::na::{doubles_equal, is_na_double, is_na_int, Logical, NA_DOUBLE, NA_INTEGER};
use crate::error::{Result, RserveError};

/// Payload of a [`Sexp`].
#[derive(Debug, Clone)]
pub enum SexpData {
    /// The empty value.
    Null,
    /// Scalar logical.
    Bool(Logical),
    /// Scalar integer; `NA_INTEGER` is missing.
    Int(i32),
    /// Scalar double; `NA_DOUBLE` is missing.
    Double(f64),
    /// Scalar string; `None` is missing.
    String(Option<String>),
    /// Integer vector.
    ArrayInt(Vec<i32>),
    /// Double vector.
    ArrayDouble(Vec<f64>),
    /// String vector.
    ArrayString(Vec<Option<String>>),
    /// Logical vector.
    ArrayBool(Vec<Logical>),
    /// Generic vector of values, optionally keyed by `names`.
    List(Vec<Sexp>),
}

impl PartialEq for SexpData {
    fn eq(&self, other: &Self) -> bool {
        use SexpData::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Double(a), Double(b)) => doubles_equal(*a, *b),
            (String(a), String(b)) => a == b,
            (ArrayInt(a), ArrayInt(b)) => a == b,
            (ArrayDouble(a), ArrayDouble(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| doubles_equal(*x, *y))
            }
            (ArrayString(a), ArrayString(b)) => a == b,
            (ArrayBool(a), ArrayBool(b)) => a == b,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

/// A protocol value with optional attributes.
#[derive(Debug, Clone)]
pub struct Sexp {
    data: SexpData,
    attributes: Option<Box<Attributes>>,
}

impl PartialEq for Sexp {
    fn eq(&self, other: &Self) -> bool {
        let empty = Attributes::new();
        let a = self.attributes.as_deref().unwrap_or(&empty);
        let b = other.attributes.as_deref().unwrap_or(&empty);
        self.data == other.data && a == b
    }
}

impl From<SexpData> for Sexp {
    fn from(data: SexpData) -> Self {
        Sexp::new(data)
    }
}

impl Default for Sexp {
    fn default() -> Self {
        Sexp::null()
    }
}

impl Sexp {
    /// Wrap a payload with no attributes.
    pub fn new(data: SexpData) -> Self {
        Self {
            data,
            attributes: None,
        }
    }

    /// The NULL value.
    pub fn null() -> Self {
        Self::new(SexpData::Null)
    }

    /// Missing logical.
    pub fn na_bool() -> Self {
        Self::new(SexpData::Bool(Logical::Na))
    }

    /// Missing integer.
    pub fn na_int() -> Self {
        Self::new(SexpData::Int(NA_INTEGER))
    }

    /// Missing double.
    pub fn na_double() -> Self {
        Self::new(SexpData::Double(NA_DOUBLE))
    }

    /// Missing string.
    pub fn na_string() -> Self {
        Self::new(SexpData::String(None))
    }

    /// Empty list.
    pub fn list() -> Self {
        Self::new(SexpData::List(Vec::new()))
    }

    /// Borrow the payload.
    pub fn data(&self) -> &SexpData {
        &self.data
    }

    /// Take the payload, dropping attributes.
    pub fn into_data(self) -> SexpData {
        self.data
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match &self.data {
            SexpData::Null => "null",
            SexpData::Bool(_) => "bool",
            SexpData::Int(_) => "int",
            SexpData::Double(_) => "double",
            SexpData::String(_) => "string",
            SexpData::ArrayInt(_) => "int array",
            SexpData::ArrayDouble(_) => "double array",
            SexpData::ArrayString(_) => "string array",
            SexpData::ArrayBool(_) => "bool array",
            SexpData::List(_) => "list",
        }
    }

    /// Whether this is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self.data, SexpData::Null)
    }

    fn mismatch(&self, expected: &'static str) -> RserveError {
        RserveError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Attribute map, if any attribute was ever set.
    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_deref()
    }

    /// Attribute map, created on first use.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        self.attributes.get_or_insert_with(Default::default)
    }

    /// Look up one attribute.
    pub fn attr(&self, name: &str) -> Option<&Sexp> {
        self.attributes.as_ref()?.get(name)
    }

    /// Set one attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: Sexp) -> Option<Sexp> {
        self.attributes_mut().insert(name, value)
    }

    /// Remove one attribute.
    pub fn remove_attr(&mut self, name: &str) -> Option<Sexp> {
        self.attributes.as_mut()?.remove(name)
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: Sexp) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Replace the whole attribute map. An empty map is stored as none.
    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = if attributes.is_empty() {
            None
        } else {
            Some(Box::new(attributes))
        };
    }

    // ------------------------------------------------------------------
    // Scalar coercions
    // ------------------------------------------------------------------

    /// Tri-state logical value of a logical scalar or length-1 vector.
    pub fn as_logical(&self) -> Result<Logical> {
        match &self.data {
            SexpData::Bool(b) => Ok(*b),
            SexpData::ArrayBool(v) if v.len() == 1 => Ok(v[0]),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Boolean value; NA is a type mismatch.
    pub fn as_bool(&self) -> Result<bool> {
        self.as_logical()?.to_bool().ok_or(RserveError::TypeMismatch {
            expected: "bool",
            found: "NA",
        })
    }

    /// Integer value. NA comes back as `NA_INTEGER`.
    pub fn as_int(&self) -> Result<i32> {
        match &self.data {
            SexpData::Int(i) => Ok(*i),
            SexpData::ArrayInt(v) if v.len() == 1 => Ok(v[0]),
            _ => Err(self.mismatch("int")),
        }
    }

    /// Double value. Integers widen, and integer NA becomes `NA_DOUBLE`.
    pub fn as_double(&self) -> Result<f64> {
        let widen = |i: i32| if is_na_int(i) { NA_DOUBLE } else { f64::from(i) };
        match &self.data {
            SexpData::Double(d) => Ok(*d),
            SexpData::ArrayDouble(v) if v.len() == 1 => Ok(v[0]),
            SexpData::Int(i) => Ok(widen(*i)),
            SexpData::ArrayInt(v) if v.len() == 1 => Ok(widen(v[0])),
            _ => Err(self.mismatch("double")),
        }
    }

    /// String value; `None` is NA.
    pub fn as_string(&self) -> Result<Option<&str>> {
        match &self.data {
            SexpData::String(s) => Ok(s.as_deref()),
            SexpData::ArrayString(v) if v.len() == 1 => Ok(v[0].as_deref()),
            _ => Err(self.mismatch("string")),
        }
    }

    /// All elements as strings.
    ///
    /// Lists are converted element by element, so each element must itself
    /// be a string.
    pub fn as_string_array(&self) -> Result<Vec<Option<String>>> {
        match &self.data {
            SexpData::String(s) => Ok(vec![s.clone()]),
            SexpData::ArrayString(v) => Ok(v.clone()),
            SexpData::List(items) => items
                .iter()
                .map(|s| s.as_string().map(|o| o.map(str::to_owned)))
                .collect(),
            _ => Err(self.mismatch("string array")),
        }
    }

    /// Borrow the elements of a list.
    pub fn as_list(&self) -> Result<&[Sexp]> {
        match &self.data {
            SexpData::List(items) => Ok(items),
            _ => Err(self.mismatch("list")),
        }
    }

    /// Whether this single value is missing.
    ///
    /// Length-1 vectors answer for their only element; any other length is
    /// an invalid operation.
    pub fn is_na(&self) -> Result<bool> {
        match &self.data {
            SexpData::Bool(b) => Ok(b.is_na()),
            SexpData::Int(i) => Ok(is_na_int(*i)),
            SexpData::Double(d) => Ok(is_na_double(*d)),
            SexpData::String(s) => Ok(s.is_none()),
            SexpData::ArrayBool(v) if v.len() == 1 => Ok(v[0].is_na()),
            SexpData::ArrayInt(v) if v.len() == 1 => Ok(is_na_int(v[0])),
            SexpData::ArrayDouble(v) if v.len() == 1 => Ok(is_na_double(v[0])),
            SexpData::ArrayString(v) if v.len() == 1 => Ok(v[0].is_none()),
            SexpData::List(v) if v.len() == 1 => v[0].is_na(),
            SexpData::Null
            | SexpData::ArrayBool(_)
            | SexpData::ArrayInt(_)
            | SexpData::ArrayDouble(_)
            | SexpData::ArrayString(_)
            | SexpData::List(_) => Err(RserveError::InvalidOperation(format!(
                "only single values can be tested for NA, got {} of length {}",
                self.type_name(),
                self.len().unwrap_or(0)
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Sequence operations
    // ------------------------------------------------------------------

    /// Number of elements. NULL has none; scalars are not collections.
    pub fn len(&self) -> Result<usize> {
        match &self.data {
            SexpData::Null => Ok(0),
            SexpData::ArrayInt(v) => Ok(v.len()),
            SexpData::ArrayDouble(v) => Ok(v.len()),
            SexpData::ArrayString(v) => Ok(v.len()),
            SexpData::ArrayBool(v) => Ok(v.len()),
            SexpData::List(v) => Ok(v.len()),
            SexpData::Bool(_) | SexpData::Int(_) | SexpData::Double(_) | SexpData::String(_) => {
                Err(self.mismatch("vector"))
            }
        }
    }

    /// Whether the collection has no elements.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.len()?;
        if index < len {
            Ok(())
        } else {
            Err(RserveError::IndexOutOfBounds { index, len })
        }
    }

    /// Element at `index`. Vector elements come back as scalars.
    pub fn element(&self, index: usize) -> Result<Sexp> {
        self.check_index(index)?;
        Ok(match &self.data {
            SexpData::ArrayInt(v) => SexpData::Int(v[index]).into(),
            SexpData::ArrayDouble(v) => SexpData::Double(v[index]).into(),
            SexpData::ArrayString(v) => SexpData::String(v[index].clone()).into(),
            SexpData::ArrayBool(v) => SexpData::Bool(v[index]).into(),
            SexpData::List(v) => v[index].clone(),
            SexpData::Null
            | SexpData::Bool(_)
            | SexpData::Int(_)
            | SexpData::Double(_)
            | SexpData::String(_) => return Err(self.mismatch("vector")),
        })
    }

    /// Overwrite the element at `index`, coercing to the element type.
    pub fn set(&mut self, index: usize, value: Sexp) -> Result<()> {
        self.check_index(index)?;
        let found = self.type_name();
        match &mut self.data {
            SexpData::ArrayInt(v) => v[index] = value.as_int()?,
            SexpData::ArrayDouble(v) => v[index] = value.as_double()?,
            SexpData::ArrayString(v) => v[index] = value.as_string()?.map(str::to_owned),
            SexpData::ArrayBool(v) => v[index] = value.as_logical()?,
            SexpData::List(v) => v[index] = value,
            SexpData::Null
            | SexpData::Bool(_)
            | SexpData::Int(_)
            | SexpData::Double(_)
            | SexpData::String(_) => {
                return Err(RserveError::TypeMismatch {
                    expected: "mutable vector",
                    found,
                })
            }
        }
        Ok(())
    }

    /// Insert into the data only. The value is coerced before anything
    /// is touched.
    fn insert_data(&mut self, at: usize, value: Sexp) -> Result<()> {
        let len = self.len()?;
        if at > len {
            return Err(RserveError::IndexOutOfBounds { index: at, len });
        }
        let found = self.type_name();
        match &mut self.data {
            SexpData::ArrayInt(v) => v.insert(at, value.as_int()?),
            SexpData::ArrayDouble(v) => v.insert(at, value.as_double()?),
            SexpData::ArrayString(v) => v.insert(at, value.as_string()?.map(str::to_owned)),
            SexpData::ArrayBool(v) => v.insert(at, value.as_logical()?),
            SexpData::List(v) => v.insert(at, value),
            SexpData::Null
            | SexpData::Bool(_)
            | SexpData::Int(_)
            | SexpData::Double(_)
            | SexpData::String(_) => {
                return Err(RserveError::TypeMismatch {
                    expected: "mutable vector",
                    found,
                })
            }
        }
        Ok(())
    }

    fn names_mut(&mut self) -> Option<&mut Vec<Option<String>>> {
        match &mut self.attributes.as_mut()?.get_mut(NAMES)?.data {
            SexpData::ArrayString(names) => Some(names),
            _ => None,
        }
    }

    /// Append an unnamed element. If the value carries names, an empty
    /// name is appended too.
    pub fn push(&mut self, value: Sexp) -> Result<()> {
        let len = self.len()?;
        self.insert(len, value)
    }

    /// Insert an unnamed element at `at`.
    pub fn insert(&mut self, at: usize, value: Sexp) -> Result<()> {
        self.insert_data(at, value)?;
        if let Some(names) = self.names_mut() {
            let pos = at.min(names.len());
            names.insert(pos, Some(String::new()));
        }
        Ok(())
    }

    /// Remove and return the element at `index`, along with its name.
    pub fn remove_at(&mut self, index: usize) -> Result<Sexp> {
        let removed = self.element(index)?;
        match &mut self.data {
            SexpData::ArrayInt(v) => {
                v.remove(index);
            }
            SexpData::ArrayDouble(v) => {
                v.remove(index);
            }
            SexpData::ArrayString(v) => {
                v.remove(index);
            }
            SexpData::ArrayBool(v) => {
                v.remove(index);
            }
            SexpData::List(v) => {
                v.remove(index);
            }
            // element() already rejected these
            SexpData::Null
            | SexpData::Bool(_)
            | SexpData::Int(_)
            | SexpData::Double(_)
            | SexpData::String(_) => unreachable!(),
        }
        if let Some(names) = self.names_mut() {
            if index < names.len() {
                names.remove(index);
            }
        }
        Ok(removed)
    }

    /// Remove every element, and every name.
    pub fn clear(&mut self) -> Result<()> {
        let found = self.type_name();
        match &mut self.data {
            SexpData::ArrayInt(v) => v.clear(),
            SexpData::ArrayDouble(v) => v.clear(),
            SexpData::ArrayString(v) => v.clear(),
            SexpData::ArrayBool(v) => v.clear(),
            SexpData::List(v) => v.clear(),
            SexpData::Null
            | SexpData::Bool(_)
            | SexpData::Int(_)
            | SexpData::Double(_)
            | SexpData::String(_) => {
                return Err(RserveError::TypeMismatch {
                    expected: "mutable vector",
                    found,
                })
            }
        }
        if let Some(names) = self.names_mut() {
            names.clear();
        }
        Ok(())
    }

    /// Position of the first element equal to `item`.
    ///
    /// Vector searches coerce `item` to the element type; an item that does
    /// not coerce is simply not found. NA matches NA.
    pub fn index_of(&self, item: &Sexp) -> Result<Option<usize>> {
        Ok(match &self.data {
            SexpData::ArrayInt(v) => item.as_int().ok().and_then(|x| v.iter().position(|e| *e == x)),
            SexpData::ArrayDouble(v) => item
                .as_double()
                .ok()
                .and_then(|x| v.iter().position(|e| doubles_equal(*e, x))),
            SexpData::ArrayString(v) => item
                .as_string()
                .ok()
                .and_then(|x| v.iter().position(|e| e.as_deref() == x)),
            SexpData::ArrayBool(v) => item
                .as_logical()
                .ok()
                .and_then(|x| v.iter().position(|e| *e == x)),
            SexpData::List(v) => v.iter().position(|e| e == item),
            SexpData::Null => None,
            SexpData::Bool(_) | SexpData::Int(_) | SexpData::Double(_) | SexpData::String(_) => {
                return Err(self.mismatch("vector"))
            }
        })
    }

    /// Whether any element equals `item`.
    pub fn contains(&self, item: &Sexp) -> Result<bool> {
        Ok(self.index_of(item)?.is_some())
    }

    /// Iterate over the elements as owned values.
    pub fn iter(&self) -> Result<impl Iterator<Item = Sexp> + '_> {
        let len = self.len()?;
        Ok((0..len).filter_map(move |i| self.element(i).ok()))
    }

    // ------------------------------------------------------------------
    // Keyed operations
    // ------------------------------------------------------------------

    /// The `names` attribute, when it is a string vector.
    pub fn names(&self) -> Option<&[Option<String>]> {
        match &self.attr(NAMES)?.data {
            SexpData::ArrayString(names) => Some(names),
            _ => None,
        }
    }

    /// Names as plain strings; NA names read as `"NA"`.
    pub fn keys(&self) -> Result<Vec<String>> {
        let names = self
            .names()
            .ok_or_else(|| RserveError::InvalidOperation("value has no names".into()))?;
        Ok(names
            .iter()
            .map(|n| n.clone().unwrap_or_else(|| "NA".to_owned()))
            .collect())
    }

    fn position_of(&self, key: &str) -> Option<usize> {
        self.names()?.iter().position(|n| n.as_deref() == Some(key))
    }

    /// Whether some element is named `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position_of(key).is_some()
    }

    /// First element named `key`.
    pub fn get_by_name(&self, key: &str) -> Result<Sexp> {
        match self.position_of(key) {
            Some(pos) => self.element(pos),
            None => Err(RserveError::KeyNotFound(key.to_owned())),
        }
    }

    /// Overwrite the first element named `key`, or append a new named one.
    pub fn set_by_name(&mut self, key: &str, value: Sexp) -> Result<()> {
        match self.position_of(key) {
            Some(pos) => self.set(pos, value),
            None => self.push_named(key, value),
        }
    }

    /// Append an element under `key`.
    ///
    /// Creates the `names` attribute if needed, giving earlier elements
    /// empty names.
    pub fn push_named(&mut self, key: impl Into<String>, value: Sexp) -> Result<()> {
        let len = self.len()?;
        self.insert_data(len, value)?;
        if self.names_mut().is_none() {
            let blank = vec![Some(String::new()); len];
            self.set_attr(NAMES, SexpData::ArrayString(blank).into());
        }
        if let Some(names) = self.names_mut() {
            names.resize(len, Some(String::new()));
            names.push(Some(key.into()));
        }
        Ok(())
    }

    /// Remove the first element named `key`. Returns whether one was found.
    pub fn remove_by_name(&mut self, key: &str) -> Result<bool> {
        match self.position_of(key) {
            Some(pos) => {
                self.remove_at(pos)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Dimensions
    // ------------------------------------------------------------------

    /// Per-axis extents from the `dim` attribute.
    pub fn dim(&self) -> Option<&[i32]> {
        match &self.attr(DIM)?.data {
            SexpData::ArrayInt(dims) => Some(dims),
            _ => None,
        }
    }

    /// Number of dimensions.
    pub fn rank(&self) -> Result<usize> {
        self.dim()
            .map(<[i32]>::len)
            .ok_or_else(|| RserveError::InvalidOperation("value has no dim attribute".into()))
    }

    /// Extent of one axis.
    pub fn extent(&self, axis: usize) -> Result<usize> {
        let dims = self
            .dim()
            .ok_or_else(|| RserveError::InvalidOperation("value has no dim attribute".into()))?;
        let extent = dims.get(axis).ok_or(RserveError::IndexOutOfBounds {
            index: axis,
            len: dims.len(),
        })?;
        Ok(usize::try_from(*extent).unwrap_or(0))
    }

    /// Column-major flat index of `coords`.
    pub fn flat_index(&self, coords: &[usize]) -> Result<usize> {
        let rank = self.rank()?;
        if coords.len() != rank {
            return Err(RserveError::InvalidOperation(format!(
                "{} coordinates given for a value of rank {}",
                coords.len(),
                rank
            )));
        }
        let overflow = || {
            RserveError::InvalidOperation(format!("coordinates {coords:?} overflow the flat index"))
        };
        let mut flat: usize = 0;
        let mut stride: usize = 1;
        for (axis, &coord) in coords.iter().enumerate() {
            let extent = self.extent(axis)?;
            if coord >= extent {
                return Err(RserveError::IndexOutOfBounds {
                    index: coord,
                    len: extent,
                });
            }
            flat = coord
                .checked_mul(stride)
                .and_then(|offset| flat.checked_add(offset))
                .ok_or_else(overflow)?;
            if axis + 1 < rank {
                stride = stride.checked_mul(extent).ok_or_else(overflow)?;
            }
        }
        Ok(flat)
    }

    /// Element at N-dimensional coordinates.
    pub fn get_at(&self, coords: &[usize]) -> Result<Sexp> {
        self.element(self.flat_index(coords)?)
    }

    /// Overwrite the element at N-dimensional coordinates.
    pub fn set_at(&mut self, coords: &[usize], value: Sexp) -> Result<()> {
        let index = self.flat_index(coords)?;
        self.set(index, value)
    }

    fn require_matrix(&self) -> Result<()> {
        match self.rank()? {
            2 => Ok(()),
            rank => Err(RserveError::InvalidOperation(format!(
                "only values of rank 2 can be accessed as matrices, rank is {rank}"
            ))),
        }
    }

    /// Matrix element at (`row`, `col`).
    pub fn get2(&self, row: usize, col: usize) -> Result<Sexp> {
        self.require_matrix()?;
        self.get_at(&[row, col])
    }

    /// Overwrite the matrix element at (`row`, `col`).
    pub fn set2(&mut self, row: usize, col: usize, value: Sexp) -> Result<()> {
        self.require_matrix()?;
        self.set_at(&[row, col], value)
    }
}

struct Elem<'a>(&'a Sexp, usize);

impl fmt::Display for Elem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Elem(sexp, i) = *self;
        match &sexp.data {
            SexpData::ArrayInt(v) => write_int(f, v[i]),
            SexpData::ArrayDouble(v) => write_double(f, v[i]),
            SexpData::ArrayString(v) => match &v[i] {
                Some(s) => write!(f, "{s:?}"),
                None => f.write_str("NA"),
            },
            SexpData::ArrayBool(v) => write!(f, "{}", v[i]),
            SexpData::List(v) => write!(f, "{}", v[i]),
            _ => write!(f, "{sexp}"),
        }
    }
}

fn write_int(f: &mut fmt::Formatter<'_>, x: i32) -> fmt::Result {
    if is_na_int(x) {
        f.write_str("NA")
    } else {
        write!(f, "{x}")
    }
}

fn write_double(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if is_na_double(x) {
        f.write_str("NA")
    } else {
        write!(f, "{x}")
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            SexpData::Null => f.write_str("NULL"),
            SexpData::Bool(b) => write!(f, "{b}"),
            SexpData::Int(i) => write_int(f, *i),
            SexpData::Double(d) => write_double(f, *d),
            SexpData::String(Some(s)) => f.write_str(s),
            SexpData::String(None) => f.write_str("NA"),
            _ => {
                let len = self.len().unwrap_or(0);
                let names = self.names();
                let open = if matches!(self.data, SexpData::List(_)) {
                    "list("
                } else {
                    "c("
                };
                f.write_str(open)?;
                for i in 0..len {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match names.and_then(|n| n.get(i)).and_then(Option::as_deref) {
                        Some(name) if !name.is_empty() => write!(f, "{name} = ")?,
                        _ => {}
                    }
                    write!(f, "{}", Elem(self, i))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubles(v: &[f64]) -> Sexp {
        SexpData::ArrayDouble(v.to_vec()).into()
    }

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(Sexp::from(7).as_int().unwrap(), 7);
        assert_eq!(Sexp::from(7).as_double().unwrap(), 7.0);
        assert_eq!(Sexp::from(2.5).as_double().unwrap(), 2.5);
        assert_eq!(Sexp::from("hi").as_string().unwrap(), Some("hi"));
        assert!(Sexp::from(true).as_bool().unwrap());
    }

    #[test]
    fn test_scalar_accessor_type_mismatch() {
        let err = Sexp::from("hi").as_int().unwrap_err();
        assert!(matches!(
            err,
            RserveError::TypeMismatch {
                expected: "int",
                found: "string"
            }
        ));
        assert!(Sexp::null().as_double().is_err());
        assert!(Sexp::from(1.5).as_bool().is_err());
    }

    #[test]
    fn test_na_bool_is_not_a_bool() {
        let na = Sexp::na_bool();
        assert_eq!(na.as_logical().unwrap(), Logical::Na);
        assert!(na.as_bool().is_err());
    }

    #[test]
    fn test_int_na_widens_to_double_na() {
        let d = Sexp::na_int().as_double().unwrap();
        assert!(is_na_double(d));
    }

    #[test]
    fn test_length_one_vector_acts_as_scalar() {
        assert_eq!(Sexp::from(vec![42]).as_int().unwrap(), 42);
        assert_eq!(doubles(&[1.25]).as_double().unwrap(), 1.25);
        assert!(Sexp::from(vec![1, 2]).as_int().is_err());
    }

    #[test]
    fn test_is_na_length_one_matches_scalar() {
        assert_eq!(
            Sexp::from(vec![NA_INTEGER]).is_na().unwrap(),
            Sexp::na_int().is_na().unwrap()
        );
        assert_eq!(
            doubles(&[NA_DOUBLE]).is_na().unwrap(),
            Sexp::na_double().is_na().unwrap()
        );
        assert_eq!(
            Sexp::from(vec![None::<String>]).is_na().unwrap(),
            Sexp::na_string().is_na().unwrap()
        );
        assert!(!Sexp::from(vec![3]).is_na().unwrap());
    }

    #[test]
    fn test_is_na_rejects_other_lengths() {
        let err = Sexp::from(vec![1, 2, 3]).is_na().unwrap_err();
        assert!(matches!(err, RserveError::InvalidOperation(_)));
        assert!(Sexp::from(Vec::<i32>::new()).is_na().is_err());
        assert!(Sexp::null().is_na().is_err());
    }

    #[test]
    fn test_scalars_are_not_collections() {
        assert!(Sexp::from(1).len().is_err());
        assert!(Sexp::from(1).element(0).is_err());
        assert_eq!(Sexp::null().len().unwrap(), 0);
    }

    #[test]
    fn test_vector_mutation_coerces() {
        let mut v = doubles(&[1.0, 2.0]);
        v.push(Sexp::from(3)).unwrap();
        v.insert(0, Sexp::from(0.5)).unwrap();
        v.set(1, Sexp::from(9.0)).unwrap();
        assert_eq!(v, doubles(&[0.5, 9.0, 2.0, 3.0]));

        let removed = v.remove_at(2).unwrap();
        assert_eq!(removed, Sexp::from(2.0));
        assert_eq!(v.len().unwrap(), 3);

        assert!(v.push(Sexp::from("x")).is_err());
        assert_eq!(v.len().unwrap(), 3);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut v = Sexp::from(vec![1, 2]);
        assert!(matches!(
            v.element(2),
            Err(RserveError::IndexOutOfBounds { index: 2, len: 2 })
        ));
        assert!(v.insert(3, Sexp::from(1)).is_err());
        assert!(v.remove_at(5).is_err());
    }

    #[test]
    fn test_index_of_and_contains() {
        let v = doubles(&[1.0, NA_DOUBLE, 3.5]);
        assert_eq!(v.index_of(&Sexp::from(3.5)).unwrap(), Some(2));
        assert_eq!(v.index_of(&Sexp::na_double()).unwrap(), Some(1));
        assert_eq!(v.index_of(&Sexp::from("x")).unwrap(), None);
        assert!(v.contains(&Sexp::from(1)).unwrap());
        assert!(Sexp::from(1).index_of(&Sexp::from(1)).is_err());
    }

    #[test]
    fn test_keyed_list_stays_in_sync() {
        let mut list = Sexp::list();
        list.push_named("x", Sexp::from(1)).unwrap();
        list.push_named("y", Sexp::from(2)).unwrap();
        assert!(list.remove_by_name("x").unwrap());

        assert_eq!(list.names().unwrap(), &[Some("y".to_owned())]);
        assert_eq!(list.len().unwrap(), 1);
        assert_eq!(list.get_by_name("y").unwrap(), Sexp::from(2));
        assert!(!list.contains_key("x"));
        assert!(!list.remove_by_name("x").unwrap());
    }

    #[test]
    fn test_set_by_name_overwrites_or_appends() {
        let mut list = Sexp::list();
        list.set_by_name("a", Sexp::from(1)).unwrap();
        list.set_by_name("b", Sexp::from(2)).unwrap();
        list.set_by_name("a", Sexp::from(10)).unwrap();

        assert_eq!(list.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(list.get_by_name("a").unwrap(), Sexp::from(10));
        assert!(matches!(
            list.get_by_name("zzz"),
            Err(RserveError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let mut list = Sexp::list();
        list.push_named("k", Sexp::from(1)).unwrap();
        list.push_named("k", Sexp::from(2)).unwrap();
        assert_eq!(list.get_by_name("k").unwrap(), Sexp::from(1));
    }

    #[test]
    fn test_unnamed_push_onto_named_list_adds_blank_name() {
        let mut list = Sexp::list();
        list.push_named("a", Sexp::from(1)).unwrap();
        list.push(Sexp::from(2)).unwrap();
        list.insert(0, Sexp::from(0)).unwrap();
        assert_eq!(list.keys().unwrap(), vec!["", "a", ""]);

        list.clear().unwrap();
        assert_eq!(list.names().unwrap().len(), 0);
    }

    #[test]
    fn test_push_named_backfills_names() {
        let mut list = Sexp::list();
        list.push(Sexp::from(1)).unwrap();
        list.push_named("b", Sexp::from(2)).unwrap();
        assert_eq!(list.keys().unwrap(), vec!["", "b"]);
    }

    #[test]
    fn test_named_vector_lookup() {
        let mut v = Sexp::from(vec![1.5, 2.5]);
        v.set_attr(NAMES, Sexp::from(vec!["lo", "hi"]));
        assert_eq!(v.get_by_name("hi").unwrap(), Sexp::from(2.5));
    }

    #[test]
    fn test_rank_and_matrix_indexing() {
        let m = Sexp::from(vec![1, 4, 2, 5, 3, 6]).with_attr(DIM, Sexp::from(vec![2, 3]));
        assert_eq!(m.rank().unwrap(), 2);
        assert_eq!(m.extent(0).unwrap(), 2);
        assert_eq!(m.get2(1, 2).unwrap(), Sexp::from(6));
        assert_eq!(m.get2(0, 1).unwrap(), Sexp::from(2));
        assert!(matches!(
            m.get2(2, 0),
            Err(RserveError::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_matrix_access_requires_rank_two() {
        let plain = Sexp::from(vec![1, 2, 3]);
        assert!(matches!(
            plain.get2(0, 0),
            Err(RserveError::InvalidOperation(_))
        ));

        let cube = Sexp::from((0..8).collect::<Vec<i32>>())
            .with_attr(DIM, Sexp::from(vec![2, 2, 2]));
        assert!(matches!(
            cube.get2(0, 0),
            Err(RserveError::InvalidOperation(_))
        ));
        assert!(cube.get_at(&[0, 0]).is_err());
        assert_eq!(cube.get_at(&[1, 0, 1]).unwrap(), Sexp::from(5));
    }

    #[test]
    fn test_huge_dims_do_not_overflow() {
        let huge = Sexp::from(vec![0]).with_attr(DIM, Sexp::from(vec![i32::MAX; 3]));
        // origin needs no stride past the last axis
        let _ = huge.get_at(&[0, 0, 0]);

        let far = (i32::MAX - 1) as usize;
        assert!(matches!(
            huge.get_at(&[far, far, far]),
            Err(RserveError::InvalidOperation(_))
        ));

        let deep = Sexp::from(vec![0]).with_attr(DIM, Sexp::from(vec![i32::MAX; 4]));
        assert!(matches!(
            deep.flat_index(&[0, 0, 0, 1]),
            Err(RserveError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_set2() {
        let mut m = Sexp::from(vec![0.0; 4]).with_attr(DIM, Sexp::from(vec![2, 2]));
        m.set2(1, 0, Sexp::from(7.0)).unwrap();
        assert_eq!(m.element(1).unwrap(), Sexp::from(7.0));
    }

    #[test]
    fn test_equality_is_na_aware_and_ignores_empty_attributes() {
        assert_eq!(doubles(&[NA_DOUBLE]), doubles(&[NA_DOUBLE]));
        let mut a = Sexp::from(1);
        a.set_attributes(Attributes::new());
        assert_eq!(a, Sexp::from(1));
        assert_ne!(Sexp::from(1), Sexp::from(1).with_attr("class", Sexp::from("x")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Sexp::na_int().to_string(), "NA");
        assert_eq!(Sexp::from("abc").to_string(), "abc");
        assert_eq!(doubles(&[1.0, NA_DOUBLE, 3.5]).to_string(), "c(1, NA, 3.5)");

        let mut list = Sexp::list();
        list.push_named("a", Sexp::from(1)).unwrap();
        list.push(Sexp::from(vec!["x"])).unwrap();
        assert_eq!(list.to_string(), "list(a = 1, c(\"x\"))");
    }

    #[test]
    fn test_as_string_array_from_list() {
        let mut list = Sexp::list();
        list.push(Sexp::from("a")).unwrap();
        list.push(Sexp::na_string()).unwrap();
        assert_eq!(
            list.as_string_array().unwrap(),
            vec![Some("a".to_owned()), None]
        );
        list.push(Sexp::from(1)).unwrap();
        assert!(list.as_string_array().is_err());
    }
}
