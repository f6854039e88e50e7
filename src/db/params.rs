//! Binding [`Value`] arguments to sqlx queries.
//!
//! Every variant binds as the matching native type, with one exception:
//! SQLite has no JSON storage class, so [`Value::Json`] is bound there as
//! its serialized text. SQLite's `json_*` functions accept that text, and it
//! scans back as a string. MySQL and PostgreSQL receive JSON through
//! [`sqlx::types::Json`].
//!
//! `NULL` is bound as a text-typed null on every backend.

use crate::models::Value;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Arms shared by every backend; `$json` binds the JSON payload.
macro_rules! bind_value {
    ($query:ident, $param:expr, |$doc:ident| $json:expr) => {
        match $param {
            Value::Null => $query.bind(None::<String>),
            Value::Bool(v) => $query.bind(*v),
            Value::Int(v) => $query.bind(*v),
            Value::Float(v) => $query.bind(*v),
            Value::String(v) => $query.bind(v.as_str()),
            Value::Bytes(v) => $query.bind(v.as_slice()),
            Value::Json($doc) => $json,
        }
    };
}

pub(crate) fn bind_mysql_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    bind_value!(query, param, |doc| query.bind(Json(doc)))
}

pub(crate) fn bind_postgres_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    bind_value!(query, param, |doc| query.bind(Json(doc)))
}

pub(crate) fn bind_sqlite_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    bind_value!(query, param, |doc| query.bind(doc.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_sqlite_storage_classes() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let cases = [
            (Value::Null, "null"),
            (Value::Bool(true), "integer"),
            (Value::Int(7), "integer"),
            (Value::Float(0.5), "real"),
            (Value::String("x".into()), "text"),
            (Value::Bytes(vec![1, 2]), "blob"),
            (Value::Json(serde_json::json!({"a": 1})), "text"),
        ];
        for (value, expected) in &cases {
            let row = bind_sqlite_param(sqlx::query("SELECT typeof(?)"), value)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(row.get::<String, _>(0), *expected, "binding {value:?}");
        }
    }

    #[tokio::test]
    async fn test_sqlite_json_is_readable_by_json_functions() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let doc = Value::Json(serde_json::json!({"tags": ["a", "b"]}));

        let row = bind_sqlite_param(sqlx::query("SELECT json_array_length(?, '$.tags')"), &doc)
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(row.get::<i64, _>(0), 2);
    }
}
