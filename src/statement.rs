//! Scan and update operations on prepared statements.

use crate::driver::{ExecResult, SqlStmt};
use crate::error::DbResult;
use crate::models::Value;
use crate::queryer::{last_insert_id, rows_affected};
use crate::scan::{self, RowScanner};
use async_trait::async_trait;
use std::sync::Arc;

/// A compiled statement; each call supplies only the arguments.
///
/// Safe to share between tasks.
#[async_trait]
pub trait Statement: Send + Sync {
    async fn scan(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()>;

    /// Like [`Statement::scan`] but reads exactly one row.
    async fn scan_one(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()>;

    async fn update(&self, args: &[Value]) -> DbResult<ExecResult>;

    async fn update_and_get_rows_affected(&self, args: &[Value]) -> DbResult<u64> {
        rows_affected(self.update(args).await)
    }

    async fn update_and_get_last_insert_id(&self, args: &[Value]) -> DbResult<i64> {
        last_insert_id(self.update(args).await)
    }
}

/// [`Statement`] over a driver statement. Clones share the statement.
pub struct DriverStatement<S> {
    stmt: Arc<S>,
}

impl<S: SqlStmt> DriverStatement<S> {
    pub fn new(stmt: S) -> Self {
        Self {
            stmt: Arc::new(stmt),
        }
    }

    pub(crate) async fn close(&self) -> DbResult<()> {
        self.stmt.close().await
    }
}

impl<S> Clone for DriverStatement<S> {
    fn clone(&self) -> Self {
        Self {
            stmt: Arc::clone(&self.stmt),
        }
    }
}

#[async_trait]
impl<S: SqlStmt> Statement for DriverStatement<S> {
    async fn scan(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()> {
        scan::scan(scanner, false, || self.stmt.query(args)).await
    }

    async fn scan_one(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()> {
        scan::scan(scanner, true, || self.stmt.query(args)).await
    }

    async fn update(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.stmt.exec(args).await
    }
}

/// A statement whose lifetime the caller manages.
///
/// Returned by [`Database::prepare_statement`](crate::Database::prepare_statement).
/// Call [`PreparedStatement::close`] when done with it.
pub struct PreparedStatement<S> {
    inner: DriverStatement<S>,
}

impl<S: SqlStmt> PreparedStatement<S> {
    pub(crate) fn new(stmt: S) -> Self {
        Self {
            inner: DriverStatement::new(stmt),
        }
    }

    /// Release the statement on the driver side.
    pub async fn close(self) -> DbResult<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl<S: SqlStmt> Statement for PreparedStatement<S> {
    async fn scan(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()> {
        self.inner.scan(scanner, args).await
    }

    async fn scan_one(&self, scanner: &mut dyn RowScanner, args: &[Value]) -> DbResult<()> {
        self.inner.scan_one(scanner, args).await
    }

    async fn update(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.inner.update(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::driver::SqlPreparer;
    use crate::driver::mock::MockDb;

    async fn prepared(mock: &MockDb, sql: &str) -> PreparedStatement<crate::driver::mock::MockStmt> {
        PreparedStatement::new(mock.prepare(sql).await.unwrap())
    }

    #[tokio::test]
    async fn test_statement_runs_its_sql_with_each_args() {
        let mock = MockDb::with(|s| s.rows = vec![args![7]]);
        let stmt = prepared(&mock, "SELECT n FROM t WHERE id = ?").await;
        let mut n = 0i64;

        stmt.scan(&mut crate::scan_into!(&mut n), &args![1]).await.unwrap();
        stmt.scan_one(&mut crate::scan_into!(&mut n), &args![2]).await.unwrap();

        assert_eq!(n, 7);
        let state = mock.state();
        assert_eq!(state.queries.len(), 2);
        assert_eq!(state.queries[0].1, args![1]);
        assert_eq!(state.queries[1].1, args![2]);
        assert!(state.queries.iter().all(|(sql, _)| sql == "SELECT n FROM t WHERE id = ?"));
    }

    #[tokio::test]
    async fn test_statement_update_helpers() {
        let mock = MockDb::with(|s| {
            s.rows_affected = 2;
            s.last_insert_id = 40;
        });
        let stmt = prepared(&mock, "INSERT INTO t (v) VALUES (?)").await;

        assert_eq!(stmt.update_and_get_rows_affected(&args![1]).await.unwrap(), 2);
        assert_eq!(stmt.update_and_get_last_insert_id(&args![2]).await.unwrap(), 40);
        assert_eq!(mock.state().execs.len(), 2);
    }

    #[tokio::test]
    async fn test_statement_update_error_skips_accessors() {
        let mock = MockDb::with(|s| s.exec_error = Some("locked".into()));
        let stmt = prepared(&mock, "UPDATE t SET v = ?").await;

        assert!(stmt.update_and_get_rows_affected(&args![1]).await.is_err());
        assert!(stmt.update_and_get_last_insert_id(&args![1]).await.is_err());
        assert_eq!(mock.state().accessor_calls, 0);
    }

    #[tokio::test]
    async fn test_prepared_statement_close() {
        let mock = MockDb::new();
        let stmt = prepared(&mock, "SELECT 1").await;

        stmt.close().await.unwrap();

        assert_eq!(mock.state().statements_closed, 1);
    }

    #[tokio::test]
    async fn test_close_error_is_returned() {
        let mock = MockDb::with(|s| s.close_error = Some("busy".into()));
        let stmt = prepared(&mock, "SELECT 1").await;

        assert!(stmt.close().await.is_err());
    }
}
