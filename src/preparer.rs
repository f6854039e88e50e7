//! Scoped prepared statements.

use crate::driver::SqlPreparer;
use crate::error::DbResult;
use crate::statement::{DriverStatement, Statement};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use tracing::debug;

/// Prepares statements that live only as long as a unit of work.
#[async_trait]
pub trait Preparer: Send + Sync {
    type Statement: Statement + Clone + 'static;

    /// Prepare `sql`, hand the statement to `work`, then close it.
    ///
    /// The statement is closed exactly once whether `work` succeeds, fails
    /// or panics, and the result of `work` is returned as is. Close errors
    /// are not reported. When preparing fails, `work` is not called.
    async fn prepared<F, Fut, T>(&self, sql: &str, work: F) -> DbResult<T>
    where
        F: FnOnce(Self::Statement) -> Fut + Send,
        Fut: Future<Output = DbResult<T>> + Send,
        T: Send;
}

/// [`Preparer`] over any driver handle that compiles SQL.
pub struct DriverPreparer<P> {
    inner: Arc<P>,
}

impl<P> DriverPreparer<P> {
    pub fn new(inner: Arc<P>) -> Self {
        Self { inner }
    }
}

impl<P> Clone for DriverPreparer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<P: SqlPreparer> Preparer for DriverPreparer<P>
where
    P::Stmt: 'static,
{
    type Statement = DriverStatement<P::Stmt>;

    async fn prepared<F, Fut, T>(&self, sql: &str, work: F) -> DbResult<T>
    where
        F: FnOnce(Self::Statement) -> Fut + Send,
        Fut: Future<Output = DbResult<T>> + Send,
        T: Send,
    {
        let stmt = DriverStatement::new(self.inner.prepare(sql).await?);
        let handle = stmt.clone();
        let outcome = AssertUnwindSafe(async move { work(handle).await })
            .catch_unwind()
            .await;

        if let Err(err) = stmt.close().await {
            debug!(error = %err, "Failed to close prepared statement");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => resume_unwind(panic),
        }
    }
}
