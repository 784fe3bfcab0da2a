//! Column descriptors
//!
//! A descriptor pairs a column name with plain `fn` pointers that move one
//! field between a record and a SQL value. Descriptor lists are written out
//! by hand per table, usually through the [`column!`](crate::column) macro.

use apim_core::model::StoredEnum;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;

/// Declared SQL type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Boolean,
    /// Epoch milliseconds in an INTEGER column
    Timestamp,
}

pub type Encode<T> = fn(&T) -> Value;
pub type Decode<T> = fn(&mut T, &Row<'_>, &str) -> rusqlite::Result<()>;

/// One mapped column of a table
pub struct Column<T> {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub encode: Encode<T>,
    pub decode: Decode<T>,
}

impl<T> Column<T> {
    pub const fn new(
        name: &'static str,
        sql_type: SqlType,
        encode: Encode<T>,
        decode: Decode<T>,
    ) -> Self {
        Self {
            name,
            sql_type,
            encode,
            decode,
        }
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .finish()
    }
}

/// Build a [`Column`] for one field of a record
///
/// The conversion kind selects the codec pair:
/// `text` (`String`), `opt_text` (`Option<String>`), `bool`, `opt_bool`,
/// `opt_int` (`Option<i32>`), `timestamp` (`Option<DateTime<Utc>>`) and
/// `stored_enum` (`Option<E: StoredEnum>`).
///
/// ```
/// # use apim_store::column;
/// #[derive(Default)]
/// struct Plan { id: String, name: Option<String> }
///
/// let id = column!(Plan, "id", text, id);
/// let name = column!(Plan, "name", opt_text, name);
/// assert_eq!(id.name, "id");
/// assert_eq!(name.name, "name");
/// ```
#[macro_export]
macro_rules! column {
    ($ty:ty, $name:literal, text, $field:ident) => {
        $crate::column!(@build $ty, $name, Text, $field, encode_text, decode_text)
    };
    ($ty:ty, $name:literal, opt_text, $field:ident) => {
        $crate::column!(@build $ty, $name, Text, $field, encode_opt_text, decode_opt_text)
    };
    ($ty:ty, $name:literal, bool, $field:ident) => {
        $crate::column!(@build $ty, $name, Boolean, $field, encode_bool, decode_bool)
    };
    ($ty:ty, $name:literal, opt_bool, $field:ident) => {
        $crate::column!(@build $ty, $name, Boolean, $field, encode_opt_bool, decode_opt_bool)
    };
    ($ty:ty, $name:literal, opt_int, $field:ident) => {
        $crate::column!(@build $ty, $name, Integer, $field, encode_opt_int, decode_opt_int)
    };
    ($ty:ty, $name:literal, timestamp, $field:ident) => {
        $crate::column!(@build $ty, $name, Timestamp, $field, encode_timestamp, decode_timestamp)
    };
    ($ty:ty, $name:literal, stored_enum, $field:ident) => {
        $crate::column!(@build $ty, $name, Text, $field, encode_enum, decode_enum)
    };
    (@build $ty:ty, $name:literal, $sql:ident, $field:ident, $enc:ident, $dec:ident) => {
        $crate::orm::Column::<$ty>::new(
            $name,
            $crate::orm::SqlType::$sql,
            |record| $crate::orm::column::$enc(&record.$field),
            |record, row, column| {
                record.$field = $crate::orm::column::$dec(row, column)?;
                Ok(())
            },
        )
    };
}

#[allow(clippy::ptr_arg)]
pub fn encode_text(value: &String) -> Value {
    Value::Text(value.clone())
}

pub fn encode_opt_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

pub fn encode_bool(value: &bool) -> Value {
    Value::Integer(i64::from(*value))
}

pub fn encode_opt_bool(value: &Option<bool>) -> Value {
    value.map_or(Value::Null, |b| Value::Integer(i64::from(b)))
}

pub fn encode_opt_int(value: &Option<i32>) -> Value {
    value.map_or(Value::Null, |i| Value::Integer(i64::from(i)))
}

pub fn encode_timestamp(value: &Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |ts| Value::Integer(ts.timestamp_millis()))
}

pub fn encode_enum<E: StoredEnum>(value: &Option<E>) -> Value {
    value.map_or(Value::Null, |e| Value::Text(e.as_str().to_string()))
}

/// A NULL in a non-optional text column reads as an empty string
pub fn decode_text(row: &Row<'_>, column: &str) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(column)?.unwrap_or_default())
}

pub fn decode_opt_text(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<String>> {
    row.get(column)
}

pub fn decode_bool(row: &Row<'_>, column: &str) -> rusqlite::Result<bool> {
    Ok(decode_opt_bool(row, column)?.unwrap_or(false))
}

pub fn decode_opt_bool(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<bool>> {
    Ok(row.get::<_, Option<i64>>(column)?.map(|i| i != 0))
}

pub fn decode_opt_int(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<i32>> {
    row.get(column)
}

pub fn decode_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(column)? {
        None => Ok(None),
        Some(millis) => DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| {
                rusqlite::Error::IntegralValueOutOfRange(column_index(row, column), millis)
            }),
    }
}

pub fn decode_enum<E: StoredEnum>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<E>> {
    match row.get::<_, Option<String>>(column)? {
        None => Ok(None),
        Some(text) => text.parse::<E>().map(Some).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                column_index(row, column),
                Type::Text,
                Box::new(err),
            )
        }),
    }
}

// Only reached after a successful read by name, so the lookup cannot miss
fn column_index(row: &Row<'_>, column: &str) -> usize {
    row.as_ref().column_index(column).unwrap_or_default()
}
