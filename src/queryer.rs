//! Scan and update operations that take SQL text.

use crate::driver::{ExecResult, SqlQueryer};
use crate::error::DbResult;
use crate::models::Value;
use crate::scan::{self, RowScanner};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs SQL against a connection pool or an open transaction.
#[async_trait]
pub trait Queryer: Send + Sync {
    /// Feed every row the query produces to `scanner`.
    async fn scan(&self, scanner: &mut dyn RowScanner, sql: &str, args: &[Value]) -> DbResult<()>;

    /// Feed the first row to `scanner`; fails with [`DbError::NoRows`](crate::DbError::NoRows)
    /// when there is none. Further rows are discarded.
    async fn scan_one(
        &self,
        scanner: &mut dyn RowScanner,
        sql: &str,
        args: &[Value],
    ) -> DbResult<()>;

    /// Run a statement that produces no rows.
    async fn update(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;

    async fn update_and_get_rows_affected(&self, sql: &str, args: &[Value]) -> DbResult<u64> {
        rows_affected(self.update(sql, args).await)
    }

    async fn update_and_get_last_insert_id(&self, sql: &str, args: &[Value]) -> DbResult<i64> {
        last_insert_id(self.update(sql, args).await)
    }
}

/// Accessors run only when the update itself succeeded.
pub(crate) fn rows_affected(result: DbResult<ExecResult>) -> DbResult<u64> {
    result?.rows_affected()
}

pub(crate) fn last_insert_id(result: DbResult<ExecResult>) -> DbResult<i64> {
    result?.last_insert_id()
}

/// [`Queryer`] over any driver handle that runs SQL text.
pub struct DriverQueryer<Q> {
    inner: Arc<Q>,
}

impl<Q> DriverQueryer<Q> {
    pub fn new(inner: Arc<Q>) -> Self {
        Self { inner }
    }
}

impl<Q> Clone for DriverQueryer<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<Q: SqlQueryer> Queryer for DriverQueryer<Q> {
    async fn scan(&self, scanner: &mut dyn RowScanner, sql: &str, args: &[Value]) -> DbResult<()> {
        scan::scan(scanner, false, || self.inner.query(sql, args)).await
    }

    async fn scan_one(
        &self,
        scanner: &mut dyn RowScanner,
        sql: &str,
        args: &[Value],
    ) -> DbResult<()> {
        scan::scan(scanner, true, || self.inner.query(sql, args)).await
    }

    async fn update(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.inner.exec(sql, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::driver::mock::{MockDb, driver_error};
    use crate::error::DbError;

    fn queryer(mock: &MockDb) -> DriverQueryer<MockDb> {
        DriverQueryer::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_scan_forwards_sql_and_args() {
        let mock = MockDb::with(|s| s.rows = vec![args![5]]);
        let mut id = 0i64;

        queryer(&mock)
            .scan(&mut crate::scan_into!(&mut id), "SELECT id FROM t WHERE a = ?", &args!["x"])
            .await
            .unwrap();

        assert_eq!(id, 5);
        let state = mock.state();
        assert_eq!(
            state.queries,
            vec![("SELECT id FROM t WHERE a = ?".to_string(), args!["x"])]
        );
    }

    #[tokio::test]
    async fn test_scan_one_takes_first_row() {
        let mock = MockDb::with(|s| s.rows = vec![args![1], args![2]]);
        let mut id = 0i64;

        queryer(&mock)
            .scan_one(&mut crate::scan_into!(&mut id), "SELECT id FROM t", &[])
            .await
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(mock.state().rows_closed, 1);
    }

    #[tokio::test]
    async fn test_scan_one_no_rows() {
        let mock = MockDb::new();
        let mut id = 0i64;

        let err = queryer(&mock)
            .scan_one(&mut crate::scan_into!(&mut id), "SELECT id FROM t", &[])
            .await
            .unwrap_err();

        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn test_update_helpers_return_accessor_values() {
        let mock = MockDb::with(|s| {
            s.rows_affected = 3;
            s.last_insert_id = 17;
        });
        let q = queryer(&mock);

        assert_eq!(
            q.update_and_get_rows_affected("UPDATE t SET a = 1", &[])
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            q.update_and_get_last_insert_id("INSERT INTO t VALUES (1)", &[])
                .await
                .unwrap(),
            17
        );
        assert_eq!(mock.state().accessor_calls, 2);
    }

    #[tokio::test]
    async fn test_update_helpers_skip_accessors_on_exec_error() {
        let mock = MockDb::with(|s| s.exec_error = Some("constraint failed".into()));
        let q = queryer(&mock);

        let err = q
            .update_and_get_rows_affected("UPDATE t SET a = 1", &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), driver_error("constraint failed").to_string());

        let err = q
            .update_and_get_last_insert_id("INSERT INTO t VALUES (1)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Driver(_)));

        assert_eq!(mock.state().accessor_calls, 0);
    }

    #[tokio::test]
    async fn test_accessor_error_propagates() {
        let mock = MockDb::with(|s| s.rows_affected_error = Some("not available".into()));

        let err = queryer(&mock)
            .update_and_get_rows_affected("DELETE FROM t", &[])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), driver_error("not available").to_string());
        assert_eq!(mock.state().accessor_calls, 1);
    }
}
