//! Oracle value type conversions.
//!
//! Converts between the driver-agnostic `Value` and the `oracle` crate's
//! bind and fetch types. Bind values are owned so a statement can be moved
//! onto the blocking pool together with its parameters.

use chrono::{NaiveDate, NaiveDateTime};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, SqlValue};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::services::database::traits::{Cell, Params, Row, Value};

/// An owned bind value.
pub(super) enum BindValue {
    Null(Option<String>),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl BindValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null(None),
            // NUMBER(1,0) flags
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int64(v) => Self::Int(*v),
            Value::Float64(v) => Self::Float(*v),
            Value::Decimal(d) => Self::Text(d.to_string()),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Bytes(b) => Self::Bytes(b.clone()),
            Value::Date(d) => Self::Date(*d),
            Value::DateTime(dt) => Self::DateTime(*dt),
            Value::Other { display, .. } => Self::Text(display.clone()),
        }
    }

    fn as_sql(&self) -> &dyn ToSql {
        match self {
            Self::Null(v) => v as &dyn ToSql,
            Self::Int(v) => v as &dyn ToSql,
            Self::Float(v) => v as &dyn ToSql,
            Self::Text(v) => v as &dyn ToSql,
            Self::Bytes(v) => v as &dyn ToSql,
            Self::Date(v) => v as &dyn ToSql,
            Self::DateTime(v) => v as &dyn ToSql,
        }
    }
}

/// Owned statement parameters.
pub(super) enum Binds {
    None,
    Positional(Vec<BindValue>),
    Named(Vec<(String, BindValue)>),
}

impl Binds {
    pub(super) fn from_params(params: &Params) -> Self {
        match params {
            Params::None => Self::None,
            Params::Positional(values) => {
                Self::Positional(values.iter().map(BindValue::from_value).collect())
            }
            Params::Named(values) => Self::Named(
                values
                    .iter()
                    .map(|(name, value)| (name.clone(), BindValue::from_value(value)))
                    .collect(),
            ),
        }
    }

    /// Execute a statement and return the affected row count.
    pub(super) fn execute(&self, conn: &Connection, sql: &str) -> oracle::Result<u64> {
        let statement = match self {
            Self::None => conn.execute(sql, &[])?,
            Self::Positional(values) => {
                let refs: Vec<&dyn ToSql> = values.iter().map(BindValue::as_sql).collect();
                conn.execute(sql, &refs)?
            }
            Self::Named(values) => {
                let refs: Vec<(&str, &dyn ToSql)> = values
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_sql()))
                    .collect();
                conn.execute_named(sql, &refs)?
            }
        };
        statement.row_count()
    }

    /// Run a query and convert every row.
    pub(super) fn query(&self, conn: &Connection, sql: &str) -> oracle::Result<Vec<Row>> {
        let rows = match self {
            Self::None => conn.query(sql, &[])?,
            Self::Positional(values) => {
                let refs: Vec<&dyn ToSql> = values.iter().map(BindValue::as_sql).collect();
                conn.query(sql, &refs)?
            }
            Self::Named(values) => {
                let refs: Vec<(&str, &dyn ToSql)> = values
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_sql()))
                    .collect();
                conn.query_named(sql, &refs)?
            }
        };

        rows.map(|row| row.and_then(|row| convert_row(&row)))
            .collect()
    }
}

fn convert_row(row: &oracle::Row) -> oracle::Result<Row> {
    let cells = row
        .column_info()
        .iter()
        .zip(row.sql_values())
        .map(|(info, value)| Ok(Cell::new(info.name(), convert_value(info.oracle_type(), value)?)))
        .collect::<oracle::Result<Vec<_>>>()?;
    Ok(Row::new(cells))
}

fn convert_value(oracle_type: &OracleType, value: &SqlValue) -> oracle::Result<Value> {
    if value.is_null()? {
        return Ok(Value::Null);
    }

    Ok(match oracle_type {
        OracleType::Number(_, _) => number_value(&value.get::<String>()?),
        OracleType::BinaryFloat | OracleType::BinaryDouble | OracleType::Float(_) => {
            Value::Float64(value.get()?)
        }
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => Value::DateTime(value.get()?),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => Value::Bytes(value.get()?),
        OracleType::Varchar2(_)
        | OracleType::NVarchar2(_)
        | OracleType::Char(_)
        | OracleType::NChar(_)
        | OracleType::Long
        | OracleType::CLOB
        | OracleType::NCLOB => Value::Text(value.get()?),
        other => Value::Other {
            type_name: other.to_string(),
            display: value.get::<String>()?,
        },
    })
}

/// NUMBER rendered as text: integral values become `Int64`, the rest `Decimal`.
fn number_value(text: &str) -> Value {
    if let Ok(v) = text.parse::<i64>() {
        return Value::Int64(v);
    }
    match Decimal::from_str(text) {
        Ok(d) => Value::Decimal(d),
        Err(_) => Value::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_value() {
        assert_eq!(number_value("42"), Value::Int64(42));
        assert_eq!(number_value("-7"), Value::Int64(-7));
        assert_eq!(number_value("12.50"), Value::Decimal(Decimal::new(1250, 2)));
        assert_eq!(number_value("~"), Value::Text("~".to_string()));
    }

    #[test]
    fn test_bool_binds_as_number() {
        assert!(matches!(BindValue::from_value(&Value::Bool(true)), BindValue::Int(1)));
        assert!(matches!(BindValue::from_value(&Value::Bool(false)), BindValue::Int(0)));
        assert!(matches!(BindValue::from_value(&Value::Null), BindValue::Null(None)));
    }

    #[test]
    fn test_named_params_keep_names() {
        let binds = Binds::from_params(&Params::named([("wave_id", 3i64)]));
        match binds {
            Binds::Named(values) => assert_eq!(values[0].0, "wave_id"),
            _ => panic!("expected named binds"),
        }
    }
}
