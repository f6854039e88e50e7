//! Query execution engine.
//!
//! `execute` and `prepare` are generic over a sqlx [`Executor`](sqlx::Executor),
//! so the same code runs on a pool, on a transaction's connection, and on
//! behalf of a prepared statement. `fetch` runs inside a row producer task
//! and takes the connection that task owns.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific query and write operations
//! - `postgres`: PostgreSQL-specific query and write operations
//! - `sqlite`: SQLite-specific query and write operations
//!
//! Each submodule provides identical functionality adapted to the database's type system.
//!
//! Without arguments, SQL is sent as plain text unless `prepared` is set:
//! some statements (`CREATE PROCEDURE`, multi-statement scripts) cannot be
//! prepared. Prepared executions go through sqlx's per-connection
//! statement cache.

use crate::db::DatabaseType;
use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::rows::{RowSender, forward};
use crate::driver::SqlResult;
use crate::error::{DbError, DbResult};
use crate::models::Value;

/// Outcome of an `exec` call on a sqlx backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlxResult {
    database: DatabaseType,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl SqlxResult {
    pub fn new(database: DatabaseType, rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            database,
            rows_affected,
            last_insert_id,
        }
    }
}

impl SqlResult for SqlxResult {
    fn rows_affected(&self) -> DbResult<u64> {
        Ok(self.rows_affected)
    }

    /// PostgreSQL has no last-insert id; use `INSERT ... RETURNING` with `scan_one`.
    fn last_insert_id(&self) -> DbResult<i64> {
        self.last_insert_id
            .ok_or_else(|| DbError::unsupported("last_insert_id", self.database))
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

pub(crate) mod mysql {
    use super::*;
    use sqlx::{Executor, MySql, mysql::MySqlConnection};

    pub async fn fetch(
        conn: &mut MySqlConnection,
        sql: &str,
        args: &[Value],
        prepared: bool,
        sender: &RowSender,
    ) -> DbResult<()> {
        let stream = if args.is_empty() && !prepared {
            conn.fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_mysql_param(query, arg);
            }
            query.fetch(conn)
        };
        forward(stream, sender).await
    }

    pub async fn execute<'c, E>(
        executor: E,
        sql: &str,
        args: &[Value],
        prepared: bool,
    ) -> DbResult<SqlxResult>
    where
        E: Executor<'c, Database = MySql>,
    {
        // When args are empty, execute raw SQL directly to avoid prepared statement issues
        let result = if args.is_empty() && !prepared {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_mysql_param(query, arg);
            }
            query.execute(executor).await?
        };
        Ok(SqlxResult::new(
            DatabaseType::MySQL,
            result.rows_affected(),
            Some(result.last_insert_id() as i64),
        ))
    }

    pub async fn prepare<'c, E>(executor: E, sql: &str) -> DbResult<()>
    where
        E: Executor<'c, Database = MySql>,
    {
        executor.prepare(sql).await?;
        Ok(())
    }
}

pub(crate) mod postgres {
    use super::*;
    use sqlx::{Executor, Postgres, postgres::PgConnection};

    pub async fn fetch(
        conn: &mut PgConnection,
        sql: &str,
        args: &[Value],
        prepared: bool,
        sender: &RowSender,
    ) -> DbResult<()> {
        let stream = if args.is_empty() && !prepared {
            conn.fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_postgres_param(query, arg);
            }
            query.fetch(conn)
        };
        forward(stream, sender).await
    }

    pub async fn execute<'c, E>(
        executor: E,
        sql: &str,
        args: &[Value],
        prepared: bool,
    ) -> DbResult<SqlxResult>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = if args.is_empty() && !prepared {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_postgres_param(query, arg);
            }
            query.execute(executor).await?
        };
        Ok(SqlxResult::new(
            DatabaseType::PostgreSQL,
            result.rows_affected(),
            None,
        ))
    }

    pub async fn prepare<'c, E>(executor: E, sql: &str) -> DbResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        executor.prepare(sql).await?;
        Ok(())
    }
}

pub(crate) mod sqlite {
    use super::*;
    use sqlx::{Executor, Sqlite, sqlite::SqliteConnection};

    pub async fn fetch(
        conn: &mut SqliteConnection,
        sql: &str,
        args: &[Value],
        prepared: bool,
        sender: &RowSender,
    ) -> DbResult<()> {
        let stream = if args.is_empty() && !prepared {
            conn.fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_sqlite_param(query, arg);
            }
            query.fetch(conn)
        };
        forward(stream, sender).await
    }

    pub async fn execute<'c, E>(
        executor: E,
        sql: &str,
        args: &[Value],
        prepared: bool,
    ) -> DbResult<SqlxResult>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let result = if args.is_empty() && !prepared {
            executor.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for arg in args {
                query = bind_sqlite_param(query, arg);
            }
            query.execute(executor).await?
        };
        Ok(SqlxResult::new(
            DatabaseType::SQLite,
            result.rows_affected(),
            Some(result.last_insert_rowid()),
        ))
    }

    pub async fn prepare<'c, E>(executor: E, sql: &str) -> DbResult<()>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        executor.prepare(sql).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accessors() {
        let result = SqlxResult::new(DatabaseType::SQLite, 3, Some(42));
        assert_eq!(result.rows_affected().unwrap(), 3);
        assert_eq!(result.last_insert_id().unwrap(), 42);
    }

    #[test]
    fn test_postgres_last_insert_id_unsupported() {
        let result = SqlxResult::new(DatabaseType::PostgreSQL, 1, None);
        assert_eq!(result.rows_affected().unwrap(), 1);
        let err = result.last_insert_id().unwrap_err();
        assert!(matches!(
            err,
            DbError::Unsupported {
                operation: "last_insert_id",
                database: DatabaseType::PostgreSQL
            }
        ));
        assert_eq!(
            err.to_string(),
            "last_insert_id is not supported by PostgreSQL"
        );
    }
}
