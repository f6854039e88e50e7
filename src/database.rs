//! The entry point: a database handle with transactions and statements.

use crate::config::ConnectOptions;
use crate::db::DbPool;
use crate::driver::{ExecResult, SqlDb};
use crate::error::DbResult;
use crate::models::Value;
use crate::preparer::{DriverPreparer, Preparer};
use crate::queryer::{DriverQueryer, Queryer};
use crate::scan::RowScanner;
use crate::statement::{DriverStatement, PreparedStatement};
use crate::transaction::{self, Transaction};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// A database, usable directly as a [`Queryer`] and [`Preparer`].
///
/// Cheap to clone; clones share the underlying pool.
///
/// ```no_run
/// use fluent_sql::{Database, DbError, Queryer, args};
///
/// # async fn demo() -> fluent_sql::DbResult<()> {
/// let db = Database::open("sqlite:app.db?mode=rwc").await?;
/// db.update("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)", &[])
///     .await?;
///
/// let id = db
///     .transaction(|tx| async move {
///         tx.update_and_get_last_insert_id("INSERT INTO users (name) VALUES (?)", &args!["ada"])
///             .await
///     })
///     .await?;
///
/// let mut name = String::new();
/// db.scan_one(
///     &mut fluent_sql::scan_into!(&mut name),
///     "SELECT name FROM users WHERE id = ?",
///     &args![id],
/// )
/// .await?;
/// db.close().await?;
/// # Ok::<_, DbError>(())
/// # }
/// ```
pub struct Database<D = DbPool> {
    db: Arc<D>,
    queryer: DriverQueryer<D>,
    preparer: DriverPreparer<D>,
}

impl<D> Clone for Database<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            queryer: self.queryer.clone(),
            preparer: self.preparer.clone(),
        }
    }
}

impl<D: SqlDb> Database<D> {
    /// Wrap an already opened driver handle.
    pub fn new(db: D) -> Self {
        let db = Arc::new(db);
        Self {
            queryer: DriverQueryer::new(Arc::clone(&db)),
            preparer: DriverPreparer::new(Arc::clone(&db)),
            db,
        }
    }

    /// The underlying driver handle.
    pub fn driver(&self) -> &D {
        &self.db
    }

    /// Run `work` in a transaction.
    ///
    /// The transaction is committed when `work` returns `Ok` and rolled back
    /// otherwise, including when `work` panics; the panic then continues
    /// once the rollback is done. A failed commit is returned as the error.
    /// A failed rollback is logged and does not change the result.
    ///
    /// When the transaction cannot be begun, `work` is not called.
    pub async fn transaction<F, Fut, T>(&self, work: F) -> DbResult<T>
    where
        F: FnOnce(Transaction<D::Tx>) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        transaction::run(self.db.begin(), work).await
    }

    /// Prepare a statement whose lifetime the caller manages.
    ///
    /// Close it with [`PreparedStatement::close`] once it is no longer needed.
    pub async fn prepare_statement(&self, sql: &str) -> DbResult<PreparedStatement<D::Stmt>> {
        Ok(PreparedStatement::new(self.db.prepare(sql).await?))
    }

    /// Close the database, returning whatever error the driver reports.
    pub async fn close(&self) -> DbResult<()> {
        self.db.close().await
    }
}

impl Database<DbPool> {
    /// Open a sqlx pool described by `options`.
    pub async fn connect(options: &ConnectOptions) -> DbResult<Self> {
        Ok(Self::new(DbPool::connect(options).await?))
    }

    /// Open a sqlx pool from a connection URL. Pool settings may be given as
    /// query parameters, see [`ConnectOptions::parse`].
    pub async fn open(url: &str) -> DbResult<Self> {
        Self::connect(&ConnectOptions::parse(url)?).await
    }

    /// Wrap an existing sqlx pool.
    pub fn wrap(pool: impl Into<DbPool>) -> Self {
        let pool = pool.into();
        info!(database = %pool.db_type(), "Wrapping existing pool");
        Self::new(pool)
    }
}

#[async_trait]
impl<D: SqlDb> Queryer for Database<D> {
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
impl<D: SqlDb> Preparer for Database<D>
where
    D::Stmt: 'static,
{
    type Statement = DriverStatement<D::Stmt>;

    async fn prepared<F, Fut, T>(&self, sql: &str, work: F) -> DbResult<T>
    where
        F: FnOnce(Self::Statement) -> Fut + Send,
        Fut: Future<Output = DbResult<T>> + Send,
        T: Send,
    {
        self.preparer.prepared(sql, work).await
    }
}
