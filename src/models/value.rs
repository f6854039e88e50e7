//! Column and parameter values.
//!
//! [`Value`] is what the driver binds as a query argument and what it writes
//! into a [`ScanTarget`] for every column of a scanned row.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A positional query argument or a decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// JSON document
    Json(JsonValue),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

value_from!(Bool: bool);
value_from!(Int: i64, i32, i16, i8, u32, u16, u8);
value_from!(Float: f64, f32);
value_from!(String: String, &str);
value_from!(Bytes: Vec<u8>, &[u8]);
value_from!(Json: JsonValue);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a `Vec<Value>` of positional query arguments.
///
/// ```
/// let args = fluent_sql::args![1, "alice", None::<i64>];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}

/// Self-conversion from a column value.
///
/// Implement this for your own types to scan them directly; every
/// `FromValue + Send` type is a [`ScanTarget`].
///
/// The built-in numeric conversions accept text. DECIMAL/NUMERIC columns
/// arrive as exact strings, and some drivers report numbers as text, so
/// integers and floats parse a [`Value::String`] after trimming
/// surrounding whitespace. The parse is strict otherwise: `"12.5"` does
/// not become an integer, and out-of-range values fail rather than wrap.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> DbResult<Self>;
}

/// A single destination slot for one column of a scanned row.
pub trait ScanTarget: Send {
    /// Store `value` into this slot, replacing whatever was there.
    fn scan_value(&mut self, value: Value) -> DbResult<()>;
}

impl<T: FromValue + Send> ScanTarget for T {
    fn scan_value(&mut self, value: Value) -> DbResult<()> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> DbResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Bool(v) => Ok(v as i64),
            Value::String(ref s) => s
                .trim()
                .parse()
                .map_err(|_| DbError::conversion(value.type_name(), "i64")),
            other => Err(DbError::conversion(other.type_name(), "i64")),
        }
    }
}

macro_rules! narrow_int_from_value {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> DbResult<Self> {
                    let from = value.type_name();
                    let wide = i64::from_value(value)
                        .map_err(|_| DbError::conversion(from, stringify!($ty)))?;
                    <$ty>::try_from(wide).map_err(|_| DbError::conversion(from, stringify!($ty)))
                }
            }
        )+
    };
}

narrow_int_from_value!(i32, i16, i8, u64, u32, u16, u8);

impl FromValue for f64 {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::String(ref s) => s
                .trim()
                .parse()
                .map_err(|_| DbError::conversion(value.type_name(), "f64")),
            other => Err(DbError::conversion(other.type_name(), "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> DbResult<Self> {
        let from = value.type_name();
        f64::from_value(value)
            .map(|v| v as f32)
            .map_err(|_| DbError::conversion(from, "f32"))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            // MySQL TINYINT(1) and SQLite INTEGER booleans
            Value::Int(v) => Ok(v != 0),
            Value::String(ref s) => match s.as_str() {
                "1" | "t" | "true" | "TRUE" => Ok(true),
                "0" | "f" | "false" | "FALSE" => Ok(false),
                _ => Err(DbError::conversion("string", "bool")),
            },
            other => Err(DbError::conversion(other.type_name(), "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::String(v) => Ok(v),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Json(v) => Ok(v.to_string()),
            Value::Bytes(v) => {
                String::from_utf8(v).map_err(|_| DbError::conversion("bytes", "String"))
            }
            Value::Null => Err(DbError::conversion("null", "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::String(v) => Ok(v.into_bytes()),
            other => Err(DbError::conversion(other.type_name(), "Vec<u8>")),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Json(v) => Ok(v),
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(v) => Ok(JsonValue::Bool(v)),
            Value::Int(v) => Ok(JsonValue::Number(v.into())),
            Value::Float(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .ok_or_else(|| DbError::conversion("float", "json")),
            Value::String(v) => {
                serde_json::from_str(&v).map_err(|_| DbError::conversion("string", "json"))
            }
            Value::Bytes(v) => {
                serde_json::from_slice(&v).map_err(|_| DbError::conversion("bytes", "json"))
            }
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// Temporal and UUID columns are decoded to their text form.

fn text_of(value: Value, to: &'static str) -> DbResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(DbError::conversion(other.type_name(), to)),
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> DbResult<Self> {
        let s = text_of(value, "NaiveDateTime")?;
        NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| DateTime::parse_from_rfc3339(&s).map(|dt| dt.naive_utc()))
            .map_err(|_| DbError::conversion("string", "NaiveDateTime"))
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> DbResult<Self> {
        let s = text_of(value, "DateTime<Utc>")?;
        match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            // Naive timestamps are taken as UTC
            Err(_) => NaiveDateTime::from_value(Value::String(s))
                .map(|naive| naive.and_utc())
                .map_err(|_| DbError::conversion("string", "DateTime<Utc>")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> DbResult<Self> {
        text_of(value, "NaiveDate")?
            .parse()
            .map_err(|_| DbError::conversion("string", "NaiveDate"))
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Bytes(b) => {
                Uuid::from_slice(&b).map_err(|_| DbError::conversion("bytes", "Uuid"))
            }
            other => Uuid::parse_str(&text_of(other, "Uuid")?)
                .map_err(|_| DbError::conversion("string", "Uuid")),
        }
    }
}
