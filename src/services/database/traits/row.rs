//! Driver-agnostic row and value types.
//!
//! This module contains:
//! - `Value` - A value read from or bound to an Oracle statement
//! - `Cell` - A named cell in a query result row
//! - `Row` - An ordered column-name to value mapping
//! - `Params` - Positional or named statement parameters

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unified value type covering what the loader reads and binds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Boolean value; bound as `NUMBER(1,0)` on servers without BOOLEAN
    Bool(bool),
    /// Integral NUMBER
    Int64(i64),
    /// BINARY_DOUBLE or non-integral NUMBER
    Float64(f64),
    /// NUMBER with more precision than f64 carries
    Decimal(Decimal),
    /// VARCHAR2, CHAR, CLOB
    Text(String),
    /// RAW, BLOB
    Bytes(Vec<u8>),
    /// DATE without time component
    Date(NaiveDate),
    /// DATE or TIMESTAMP
    DateTime(NaiveDateTime),
    /// Anything else, kept as its string rendering
    Other {
        /// The database-specific type name
        type_name: String,
        /// String representation for display
        display: String,
    },
}

impl Value {
    /// Try to extract as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// A named cell in a query result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Column name as reported by the driver
    pub column: String,
    /// The value of this cell
    pub value: Value,
}

impl Cell {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// A query result row: column names mapped to values, in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// The cells in this row
    pub cells: Vec<Cell>,
}

impl Row {
    /// Create a new row from cells
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Create a row from `(column, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| Cell::new(k, v.into()))
                .collect(),
        }
    }

    /// Look a value up by column name (case-insensitive).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(column))
            .map(|c| &c.value)
    }
}

/// Statement parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// No bind variables
    #[default]
    None,
    /// Bound by position (`:1`, `:2`, ...)
    Positional(Vec<Value>),
    /// Bound by name (`:order_id`)
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<K: Into<String>, V: Into<Value>>(
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
