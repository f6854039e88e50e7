//! Database-agnostic type mappings.
//!
//! Rows are decoded into [`Value`]s before any scanning happens.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the type of each column *value* into a
//!    logical category
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Classification looks at the value rather than the declared column, so
//! SQLite expression columns (`SELECT 1 + 1`) decode by their runtime type.

use crate::db::DatabaseType;
use crate::error::DbResult;
use crate::models::Value;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // INTERVAL would otherwise match "int"
    if lower == "interval" {
        return TypeCategory::Unknown;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("timestamp") || lower == "datetime" || lower == "date" || lower == "time" {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Unsigned values beyond `i64::MAX` keep their exact digits as text.
fn unsigned_value(v: u64) -> Value {
    i64::try_from(v)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::String(v.to_string()))
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Decodes a backend row into one [`Value`] per column.
pub trait DecodeRow {
    fn decode_values(&self) -> DbResult<Vec<Value>>;
}

impl DecodeRow for MySqlRow {
    fn decode_values(&self) -> DbResult<Vec<Value>> {
        (0..self.len())
            .map(|idx| mysql::decode_column(self, idx))
            .collect()
    }
}

impl DecodeRow for PgRow {
    fn decode_values(&self) -> DbResult<Vec<Value>> {
        (0..self.len())
            .map(|idx| postgres::decode_column(self, idx))
            .collect()
    }
}

impl DecodeRow for SqliteRow {
    fn decode_values(&self) -> DbResult<Vec<Value>> {
        (0..self.len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode_column(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();
        let type_name = type_info.name();
        match categorize_type(type_name, DatabaseType::MySQL) {
            TypeCategory::Decimal => Ok(Value::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get(idx)?)),
            TypeCategory::Json => Ok(Value::Json(row.try_get(idx)?)),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        // Try signed types
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        Ok(unsigned_value(row.try_get::<u64, _>(idx)?))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        Ok(Value::Float(row.try_get::<f32, _>(idx)?.into()))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize, type_name: &str) -> DbResult<Value> {
        let text = match type_name.to_lowercase().as_str() {
            "date" => row.try_get::<NaiveDate, _>(idx)?.to_string(),
            "time" => row.try_get::<NaiveTime, _>(idx)?.to_string(),
            _ => row.try_get::<NaiveDateTime, _>(idx)?.to_string(),
        };
        Ok(Value::String(text))
    }

    fn decode_text(row: &MySqlRow, idx: usize, type_name: &str) -> DbResult<Value> {
        let v = row.try_get::<String, _>(idx)?;
        // Check if this might be JSON
        if type_name.to_lowercase().contains("json") {
            if let Ok(json) = serde_json::from_str(&v) {
                return Ok(Value::Json(json));
            }
        }
        Ok(Value::String(v))
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize) -> DbResult<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();
        let type_name = type_info.name();
        match categorize_type(type_name, DatabaseType::PostgreSQL) {
            TypeCategory::Decimal => Ok(Value::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get(idx)?)),
            TypeCategory::Json => Ok(Value::Json(row.try_get(idx)?)),
            TypeCategory::Uuid => Ok(Value::String(
                row.try_get::<uuid::Uuid, _>(idx)?.to_string(),
            )),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            _ => Ok(Value::String(row.try_get(idx)?)),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        Ok(Value::Int(row.try_get::<i64, _>(idx)?))
    }

    fn decode_float(row: &PgRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        Ok(Value::Float(row.try_get::<f32, _>(idx)?.into()))
    }

    fn decode_temporal(row: &PgRow, idx: usize, type_name: &str) -> DbResult<Value> {
        let text = match type_name.to_lowercase().as_str() {
            "timestamptz" => row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339(),
            "timestamp" => row.try_get::<NaiveDateTime, _>(idx)?.to_string(),
            "date" => row.try_get::<NaiveDate, _>(idx)?.to_string(),
            _ => row.try_get::<NaiveTime, _>(idx)?.to_string(),
        };
        Ok(Value::String(text))
    }
}

mod sqlite {
    use super::*;

    /// SQLite values carry one of INTEGER, REAL, TEXT or BLOB at runtime.
    pub fn decode_column(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();
        match categorize_type(type_info.name(), DatabaseType::SQLite) {
            TypeCategory::Integer => Ok(Value::Int(row.try_get(idx)?)),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get(idx)?)),
            TypeCategory::Float | TypeCategory::Decimal => Ok(Value::Float(row.try_get(idx)?)),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get(idx)?)),
            _ => Ok(Value::String(row.try_get(idx)?)),
        }
    }
}
