//! Conversion between [`Sexp`] and host-native values.
//!
//! Each accepted native shape has its own entry point:
//!
//! | native                         | variant                      |
//! |--------------------------------|------------------------------|
//! | `bool`, `i32`, `f64`, `&str`   | scalar                       |
//! | `Vec<_>` of those              | homogeneous vector           |
//! | rows (`&[Vec<i32>]`, `&[Vec<f64>]`) | column-major vector + `dim` |
//! | `(key, Sexp)` pairs            | list + `names`               |
//!
//! `TryFrom<serde_json::Value>` composes these for dynamically shaped
//! input and rejects everything else with [`RserveError::Unconvertible`].

use serde_json::{Map, Number, Value};

use super::attributes::{CLASS, DIM, NAMES, ROW_NAMES};
use super::na::{is_na_double, is_na_int, Logical, NA_DOUBLE, NA_INTEGER};
use super::value::{Sexp, SexpData};
use crate::error::{Result, RserveError};

impl From<bool> for Sexp {
    fn from(x: bool) -> Self {
        SexpData::Bool(x.into()).into()
    }
}

impl From<Logical> for Sexp {
    fn from(x: Logical) -> Self {
        SexpData::Bool(x).into()
    }
}

impl From<i32> for Sexp {
    fn from(x: i32) -> Self {
        SexpData::Int(x).into()
    }
}

impl From<f64> for Sexp {
    fn from(x: f64) -> Self {
        SexpData::Double(x).into()
    }
}

impl From<&str> for Sexp {
    fn from(x: &str) -> Self {
        SexpData::String(Some(x.to_owned())).into()
    }
}

impl From<String> for Sexp {
    fn from(x: String) -> Self {
        SexpData::String(Some(x)).into()
    }
}

impl From<Option<String>> for Sexp {
    fn from(x: Option<String>) -> Self {
        SexpData::String(x).into()
    }
}

impl From<Vec<bool>> for Sexp {
    fn from(xs: Vec<bool>) -> Self {
        SexpData::ArrayBool(xs.into_iter().map(Logical::from).collect()).into()
    }
}

impl From<Vec<Logical>> for Sexp {
    fn from(xs: Vec<Logical>) -> Self {
        SexpData::ArrayBool(xs).into()
    }
}

impl From<Vec<i32>> for Sexp {
    fn from(xs: Vec<i32>) -> Self {
        SexpData::ArrayInt(xs).into()
    }
}

impl From<Vec<f64>> for Sexp {
    fn from(xs: Vec<f64>) -> Self {
        SexpData::ArrayDouble(xs).into()
    }
}

impl From<Vec<&str>> for Sexp {
    fn from(xs: Vec<&str>) -> Self {
        SexpData::ArrayString(xs.into_iter().map(|s| Some(s.to_owned())).collect()).into()
    }
}

impl From<Vec<String>> for Sexp {
    fn from(xs: Vec<String>) -> Self {
        SexpData::ArrayString(xs.into_iter().map(Some).collect()).into()
    }
}

impl From<Vec<Option<String>>> for Sexp {
    fn from(xs: Vec<Option<String>>) -> Self {
        SexpData::ArrayString(xs).into()
    }
}

impl From<Vec<Sexp>> for Sexp {
    fn from(xs: Vec<Sexp>) -> Self {
        SexpData::List(xs).into()
    }
}

/// Flatten row-major rows into column-major order.
fn column_major<T: Copy>(rows: &[Vec<T>]) -> Result<(Vec<T>, usize, usize)> {
    let nrow = rows.len();
    let ncol = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncol) {
        return Err(RserveError::Unconvertible(format!(
            "ragged matrix: row {i} has {} columns, expected {ncol}",
            row.len()
        )));
    }
    let mut flat = Vec::with_capacity(nrow * ncol);
    for col in 0..ncol {
        flat.extend(rows.iter().map(|row| row[col]));
    }
    Ok((flat, nrow, ncol))
}

fn dim_attr(nrow: usize, ncol: usize) -> Result<Sexp> {
    let extent = |n: usize| {
        i32::try_from(n).map_err(|_| RserveError::Unconvertible(format!("extent {n} too large")))
    };
    Ok(Sexp::from(vec![extent(nrow)?, extent(ncol)?]))
}

impl Sexp {
    /// Integer matrix from row-major rows.
    ///
    /// Stored flattened in column-major order and tagged with
    /// `dim = [rows, cols]`.
    pub fn matrix_i32(rows: &[Vec<i32>]) -> Result<Sexp> {
        let (flat, nrow, ncol) = column_major(rows)?;
        Ok(Sexp::from(flat).with_attr(DIM, dim_attr(nrow, ncol)?))
    }

    /// Double matrix from row-major rows.
    pub fn matrix_f64(rows: &[Vec<f64>]) -> Result<Sexp> {
        let (flat, nrow, ncol) = column_major(rows)?;
        Ok(Sexp::from(flat).with_attr(DIM, dim_attr(nrow, ncol)?))
    }

    /// Keyed list from `(name, value)` pairs, in order.
    pub fn from_pairs<K, I>(pairs: I) -> Sexp
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Sexp)>,
    {
        let (names, values): (Vec<Option<String>>, Vec<Sexp>) = pairs
            .into_iter()
            .map(|(k, v)| (Some(k.into()), v))
            .unzip();
        let list = Sexp::from(values);
        if names.is_empty() {
            list
        } else {
            list.with_attr(NAMES, Sexp::from(names))
        }
    }

    /// Build a data frame: a list of columns tagged `class = "data.frame"`.
    ///
    /// Each column goes through its own native conversion.
    pub fn data_frame<K, V, I>(columns: I, row_names: Option<Vec<String>>) -> Sexp
    where
        K: Into<String>,
        V: Into<Sexp>,
        I: IntoIterator<Item = (K, V)>,
    {
        let (names, values): (Vec<Option<String>>, Vec<Sexp>) = columns
            .into_iter()
            .map(|(k, v)| (Some(k.into()), v.into()))
            .unzip();
        let mut frame = Sexp::from(values)
            .with_attr(CLASS, Sexp::from(vec!["data.frame"]))
            .with_attr(NAMES, Sexp::from(names));
        if let Some(rows) = row_names {
            frame.set_attr(ROW_NAMES, Sexp::from(rows));
        }
        frame
    }

    /// Closest native representation.
    ///
    /// Vectors become flat JSON arrays (ignoring `dim`), lists with names
    /// become objects in element order, and NA becomes `null`. A blank or
    /// NA name is replaced by the element position; a repeated name keeps
    /// its first value.
    pub fn to_native(&self) -> Value {
        let int = |i: i32| {
            if is_na_int(i) {
                Value::Null
            } else {
                Value::from(i)
            }
        };
        let double = |d: f64| {
            if is_na_double(d) {
                Value::Null
            } else {
                Number::from_f64(d).map_or(Value::Null, Value::Number)
            }
        };
        let logical = |b: Logical| b.to_bool().map_or(Value::Null, Value::Bool);
        let string = |s: &Option<String>| s.clone().map_or(Value::Null, Value::String);

        match self.data() {
            SexpData::Null => Value::Null,
            SexpData::Bool(b) => logical(*b),
            SexpData::Int(i) => int(*i),
            SexpData::Double(d) => double(*d),
            SexpData::String(s) => string(s),
            SexpData::ArrayInt(v) => v.iter().copied().map(int).collect(),
            SexpData::ArrayDouble(v) => v.iter().copied().map(double).collect(),
            SexpData::ArrayString(v) => v.iter().map(string).collect(),
            SexpData::ArrayBool(v) => v.iter().copied().map(logical).collect(),
            SexpData::List(items) => match self.names() {
                Some(names) => {
                    let mut map = Map::new();
                    for (i, item) in items.iter().enumerate() {
                        let key = match names.get(i).and_then(Option::as_deref) {
                            Some(name) if !name.is_empty() => name.to_owned(),
                            _ => i.to_string(),
                        };
                        map.entry(key).or_insert_with(|| item.to_native());
                    }
                    Value::Object(map)
                }
                None => items.iter().map(Sexp::to_native).collect(),
            },
        }
    }
}

fn unconvertible(what: &str) -> RserveError {
    RserveError::Unconvertible(what.to_owned())
}

/// An integer that R can hold without colliding with the NA sentinel.
fn as_r_int(n: &Number) -> Option<i32> {
    n.as_i64()
        .and_then(|i| i32::try_from(i).ok())
        .filter(|i| *i != NA_INTEGER)
}

fn number_to_sexp(n: &Number) -> Result<Sexp> {
    if let Some(i) = as_r_int(n) {
        return Ok(i.into());
    }
    n.as_f64()
        .map(Sexp::from)
        .ok_or_else(|| unconvertible("number out of range"))
}

/// Row of a numeric matrix. `null` entries are NA.
fn numeric_row(row: &[Value]) -> Result<(Vec<Option<i32>>, Vec<f64>)> {
    let mut ints = Vec::with_capacity(row.len());
    let mut doubles = Vec::with_capacity(row.len());
    for v in row {
        match v {
            Value::Number(n) => {
                ints.push(as_r_int(n));
                doubles.push(
                    n.as_f64()
                        .ok_or_else(|| unconvertible("number out of range"))?,
                );
            }
            Value::Null => {
                ints.push(Some(NA_INTEGER));
                doubles.push(NA_DOUBLE);
            }
            _ => return Err(unconvertible("matrix rows must hold only numbers")),
        }
    }
    Ok((ints, doubles))
}

fn matrix_from_json(rows: &[Value]) -> Result<Sexp> {
    let mut int_rows = Vec::with_capacity(rows.len());
    let mut double_rows = Vec::with_capacity(rows.len());
    let mut all_int = true;
    for row in rows {
        let Value::Array(cells) = row else {
            return Err(unconvertible("matrix rows must all be arrays"));
        };
        let (ints, doubles) = numeric_row(cells)?;
        let ints: Option<Vec<i32>> = ints.into_iter().collect();
        match ints {
            Some(ints) => int_rows.push(ints),
            None => all_int = false,
        }
        double_rows.push(doubles);
    }
    if all_int {
        Sexp::matrix_i32(&int_rows)
    } else {
        Sexp::matrix_f64(&double_rows)
    }
}

fn array_to_sexp(items: Vec<Value>) -> Result<Sexp> {
    if items.is_empty() {
        return Ok(Sexp::list());
    }
    let non_null = || items.iter().filter(|v| !v.is_null());

    if non_null().next().is_none() {
        return Ok(Sexp::from(vec![Logical::Na; items.len()]));
    }
    if non_null().all(Value::is_boolean) {
        let v: Vec<Logical> = items.iter().map(|v| Logical::from(v.as_bool())).collect();
        return Ok(v.into());
    }
    if non_null().all(Value::is_string) {
        let v: Vec<Option<String>> = items
            .iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect();
        return Ok(v.into());
    }
    if non_null().all(Value::is_number) {
        let (ints, doubles) = numeric_row(&items)?;
        return Ok(match ints.into_iter().collect::<Option<Vec<i32>>>() {
            Some(ints) => ints.into(),
            None => doubles.into(),
        });
    }
    if items.iter().all(Value::is_array) {
        return matrix_from_json(&items);
    }
    Err(unconvertible(
        "arrays must be homogeneous booleans, numbers, strings or numeric rows",
    ))
}

impl TryFrom<Value> for Sexp {
    type Error = RserveError;

    fn try_from(value: Value) -> Result<Sexp> {
        match value {
            Value::Null => Ok(Sexp::null()),
            Value::Bool(b) => Ok(b.into()),
            Value::Number(n) => number_to_sexp(&n),
            Value::String(s) => Ok(s.into()),
            Value::Array(items) => array_to_sexp(items),
            Value::Object(map) => {
                let pairs = map
                    .into_iter()
                    .map(|(k, v)| Ok((k, Sexp::try_from(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Sexp::from_pairs(pairs))
            }
        }
    }
}
