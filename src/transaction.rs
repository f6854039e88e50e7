//! Transactions run as a unit of work.
//!
//! [`run`] begins a transaction, hands it to the work, commits when the
//! work succeeds and always attempts one rollback afterwards. After a
//! commit that rollback finds the transaction finished and is ignored.

use crate::driver::{ExecResult, SqlTx};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use crate::preparer::{DriverPreparer, Preparer};
use crate::queryer::{DriverQueryer, Queryer};
use crate::scan::RowScanner;
use crate::statement::DriverStatement;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use tracing::{debug, warn};

/// An open transaction handed to the work passed to
/// [`Database::transaction`](crate::Database::transaction).
///
/// Clones share the transaction. Using it after the work has returned
/// fails with [`DbError::TxDone`].
pub struct Transaction<T> {
    tx: Arc<T>,
    queryer: DriverQueryer<T>,
    preparer: DriverPreparer<T>,
}

impl<T: SqlTx> Transaction<T> {
    pub(crate) fn new(tx: T) -> Self {
        let tx = Arc::new(tx);
        Self {
            queryer: DriverQueryer::new(Arc::clone(&tx)),
            preparer: DriverPreparer::new(Arc::clone(&tx)),
            tx,
        }
    }

    /// The underlying driver transaction.
    pub fn driver(&self) -> &T {
        &self.tx
    }
}

impl<T> Clone for Transaction<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
            queryer: self.queryer.clone(),
            preparer: self.preparer.clone(),
        }
    }
}

#[async_trait]
impl<T: SqlTx> Queryer for Transaction<T> {
    async fn scan(&self, scanner: &mut dyn RowScanner, sql: &str, args: &[Value]) -> DbResult<()> {
        self.queryer.scan(scanner, sql, args).await
    }

    async fn scan_one(
        &self,
        scanner: &mut dyn RowScanner,
        sql: &str,
        args: &[Value],
    ) -> DbResult<()> {
        self.queryer.scan_one(scanner, sql, args).await
    }

    async fn update(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.queryer.update(sql, args).await
    }
}

#[async_trait]
impl<T: SqlTx> Preparer for Transaction<T>
where
    T::Stmt: 'static,
{
    type Statement = DriverStatement<T::Stmt>;

    async fn prepared<F, Fut, R>(&self, sql: &str, work: F) -> DbResult<R>
    where
        F: FnOnce(Self::Statement) -> Fut + Send,
        Fut: Future<Output = DbResult<R>> + Send,
        R: Send,
    {
        self.preparer.prepared(sql, work).await
    }
}

/// Run `work` inside a transaction begun on `begin`'s result.
///
/// Commits only when `work` returns `Ok`; a commit failure is returned.
/// Rollback is attempted exactly once on every path, panics included.
/// [`DbError::TxDone`] from it is ignored and any other rollback error is
/// logged, never returned. A panic in `work` resumes after the rollback.
pub(crate) async fn run<T, B, F, Fut, R>(begin: B, work: F) -> DbResult<R>
where
    T: SqlTx,
    B: Future<Output = DbResult<T>>,
    F: FnOnce(Transaction<T>) -> Fut,
    Fut: Future<Output = DbResult<R>>,
{
    let tx = Transaction::new(begin.await?);
    debug!("Transaction started");

    let outcome = AssertUnwindSafe(async {
        let value = work(tx.clone()).await?;
        tx.tx.commit().await?;
        debug!("Transaction committed");
        Ok::<R, DbError>(value)
    })
    .catch_unwind()
    .await;

    rollback_unless_done(tx.driver()).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => resume_unwind(panic),
    }
}

async fn rollback_unless_done<T: SqlTx>(tx: &T) {
    match tx.rollback().await {
        Ok(()) => debug!("Transaction rolled back"),
        Err(DbError::TxDone) => {}
        Err(err) => warn!(error = %err, "Failed to roll back transaction"),
    }
}
