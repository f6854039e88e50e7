//! Driver capability traits.
//!
//! These are the only operations the façade needs from a database driver.
//! [`crate::db::DbPool`] implements them over sqlx; tests plug in a recording
//! double instead.

use crate::error::{DbError, DbResult};
use crate::models::{ScanTarget, Value};
use async_trait::async_trait;

#[cfg(test)]
pub(crate) mod mock;

/// Outcome of a non-row-producing statement.
pub trait SqlResult: Send + Sync {
    /// Number of rows inserted, updated or deleted.
    fn rows_affected(&self) -> DbResult<u64>;

    /// Id generated by the statement, where the backend reports one.
    fn last_insert_id(&self) -> DbResult<i64>;
}

/// Boxed [`SqlResult`] handed back by every `update` call.
pub type ExecResult = Box<dyn SqlResult>;

/// Cursor over the rows of one query.
///
/// Callers must `close` it when done, whether or not all rows were read.
#[async_trait]
pub trait SqlRows: Send {
    /// Advance to the next row. Returns false when there are no more rows
    /// or iteration failed; check [`SqlRows::err`] to tell the two apart.
    async fn next(&mut self) -> bool;

    /// Write the current row's columns into `targets`, one column per slot.
    fn scan(&mut self, targets: &mut [&mut dyn ScanTarget]) -> DbResult<()>;

    /// Take the error that ended iteration, if any.
    fn err(&mut self) -> Option<DbError>;

    async fn close(&mut self) -> DbResult<()>;
}

/// Runs SQL text directly.
#[async_trait]
pub trait SqlQueryer: Send + Sync {
    type Rows: SqlRows;

    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<Self::Rows>;

    async fn exec(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;
}

/// Compiles SQL text into a reusable statement.
#[async_trait]
pub trait SqlPreparer: Send + Sync {
    type Stmt: SqlStmt;

    async fn prepare(&self, sql: &str) -> DbResult<Self::Stmt>;
}

/// A compiled statement. Only the bound arguments vary between executions.
#[async_trait]
pub trait SqlStmt: Send + Sync {
    type Rows: SqlRows;

    async fn query(&self, args: &[Value]) -> DbResult<Self::Rows>;

    async fn exec(&self, args: &[Value]) -> DbResult<ExecResult>;

    async fn close(&self) -> DbResult<()>;
}

/// An open driver transaction.
///
/// Once committed or rolled back, further commit/rollback calls fail with
/// [`crate::DbError::TxDone`].
#[async_trait]
pub trait SqlTx: SqlQueryer + SqlPreparer {
    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;
}

/// A connection or connection pool.
#[async_trait]
pub trait SqlDb: SqlQueryer + SqlPreparer {
    type Tx: SqlTx;

    async fn begin(&self) -> DbResult<Self::Tx>;

    async fn close(&self) -> DbResult<()>;
}
