//! Prepared statements on sqlx backends.
//!
//! sqlx caches prepared statements per connection, keyed by SQL text. A
//! [`SqlxStatement`] validates its SQL once when created and then runs it
//! through that cache with only the arguments changing.

use crate::db::pool::DbPool;
use crate::db::rows::SqlxRows;
use crate::db::transaction::SqlxTransaction;
use crate::driver::{ExecResult, SqlStmt};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug)]
enum StatementTarget {
    Pool(DbPool),
    Transaction(SqlxTransaction),
}

/// A statement prepared on a pool or inside a transaction.
#[derive(Debug)]
pub struct SqlxStatement {
    target: StatementTarget,
    sql: String,
    closed: AtomicBool,
}

impl SqlxStatement {
    pub(crate) fn on_pool(pool: DbPool, sql: &str) -> Self {
        Self::new(StatementTarget::Pool(pool), sql)
    }

    pub(crate) fn in_transaction(tx: SqlxTransaction, sql: &str) -> Self {
        Self::new(StatementTarget::Transaction(tx), sql)
    }

    fn new(target: StatementTarget, sql: &str) -> Self {
        Self {
            target,
            sql: sql.to_string(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::StatementClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl SqlStmt for SqlxStatement {
    type Rows = SqlxRows;

    async fn query(&self, args: &[Value]) -> DbResult<SqlxRows> {
        self.ensure_open()?;
        debug!(sql = %self.sql, args = args.len(), "Query with prepared statement");
        match &self.target {
            StatementTarget::Pool(pool) => pool.fetch(&self.sql, args, true).await,
            StatementTarget::Transaction(tx) => tx.fetch(&self.sql, args, true).await,
        }
    }

    async fn exec(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.ensure_open()?;
        debug!(sql = %self.sql, args = args.len(), "Exec with prepared statement");
        let result = match &self.target {
            StatementTarget::Pool(pool) => pool.execute(&self.sql, args, true).await?,
            StatementTarget::Transaction(tx) => tx.execute(&self.sql, args, true).await?,
        };
        Ok(Box::new(result))
    }

    /// Closing twice is a no-op.
    async fn close(&self) -> DbResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(sql = %self.sql, "Closed prepared statement");
        }
        Ok(())
    }
}
