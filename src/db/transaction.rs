//! sqlx transactions behind the driver traits.
//!
//! A sqlx `Transaction` is consumed by `commit`/`rollback`, while the
//! driver traits work on shared references. The transaction therefore
//! lives in a shared slot that finishing empties; anything that finds the
//! slot empty fails with [`DbError::TxDone`].

use crate::db::DatabaseType;
use crate::db::executor::{self, SqlxResult};
use crate::db::rows::{self, SqlxRows};
use crate::db::statement::SqlxStatement;
use crate::driver::{ExecResult, SqlPreparer, SqlQueryer, SqlTx};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use async_trait::async_trait;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Database-specific transaction wrapper.
///
/// This enum wraps database-specific transaction types to provide
/// a unified interface for transaction management.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(Transaction<'static, MySql>),
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            MySql(tx) => tx.commit().await.map_err(DbError::from),
            Postgres(tx) => tx.commit().await.map_err(DbError::from),
            SQLite(tx) => tx.commit().await.map_err(DbError::from),
        })
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            MySql(tx) => tx.rollback().await.map_err(DbError::from),
            Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        })
    }
}

/// An open sqlx transaction, cheap to clone.
///
/// Clones share the same transaction, which is how statements prepared
/// inside it keep running on its connection.
#[derive(Clone)]
pub struct SqlxTransaction {
    database: DatabaseType,
    inner: Arc<Mutex<Option<DbTransaction>>>,
}

impl std::fmt::Debug for SqlxTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxTransaction")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl SqlxTransaction {
    pub fn new(tx: DbTransaction) -> Self {
        Self {
            database: tx.db_type(),
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database
    }

    /// True once committed or rolled back.
    pub async fn is_done(&self) -> bool {
        self.inner.lock().await.is_none()
    }

    async fn take(&self) -> DbResult<DbTransaction> {
        self.inner.lock().await.take().ok_or(DbError::TxDone)
    }

    /// Run a query on the transaction's connection.
    ///
    /// The returned cursor holds the slot until it is closed, so other work
    /// on this transaction waits for it.
    pub(crate) async fn fetch(
        &self,
        sql: &str,
        args: &[Value],
        prepared: bool,
    ) -> DbResult<SqlxRows> {
        let inner = Arc::clone(&self.inner);
        let sql = sql.to_string();
        let args = args.to_vec();
        rows::spawn(move |sender| async move {
            let mut guard = inner.lock_owned().await;
            let tx = guard.as_mut().ok_or(DbError::TxDone)?;
            impl_db_dispatch!(DbTransaction, tx, {
                MySql(tx) => executor::mysql::fetch(tx, &sql, &args, prepared, &sender).await,
                Postgres(tx) => executor::postgres::fetch(tx, &sql, &args, prepared, &sender).await,
                SQLite(tx) => executor::sqlite::fetch(tx, &sql, &args, prepared, &sender).await,
            })
        })
        .await
    }

    pub(crate) async fn execute(
        &self,
        sql: &str,
        args: &[Value],
        prepared: bool,
    ) -> DbResult<SqlxResult> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or(DbError::TxDone)?;
        impl_db_dispatch!(DbTransaction, tx, {
            MySql(tx) => executor::mysql::execute(&mut **tx, sql, args, prepared).await,
            Postgres(tx) => executor::postgres::execute(&mut **tx, sql, args, prepared).await,
            SQLite(tx) => executor::sqlite::execute(&mut **tx, sql, args, prepared).await,
        })
    }

    pub(crate) async fn prepare_on_connection(&self, sql: &str) -> DbResult<()> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or(DbError::TxDone)?;
        impl_db_dispatch!(DbTransaction, tx, {
            MySql(tx) => executor::mysql::prepare(&mut **tx, sql).await,
            Postgres(tx) => executor::postgres::prepare(&mut **tx, sql).await,
            SQLite(tx) => executor::sqlite::prepare(&mut **tx, sql).await,
        })
    }
}

#[async_trait]
impl SqlQueryer for SqlxTransaction {
    type Rows = SqlxRows;

    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<SqlxRows> {
        debug!(sql = %sql, args = args.len(), "Query in transaction");
        self.fetch(sql, args, false).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        debug!(sql = %sql, args = args.len(), "Exec in transaction");
        Ok(Box::new(self.execute(sql, args, false).await?))
    }
}

#[async_trait]
impl SqlPreparer for SqlxTransaction {
    type Stmt = SqlxStatement;

    async fn prepare(&self, sql: &str) -> DbResult<SqlxStatement> {
        debug!(sql = %sql, "Preparing statement in transaction");
        self.prepare_on_connection(sql).await?;
        Ok(SqlxStatement::in_transaction(self.clone(), sql))
    }
}

#[async_trait]
impl SqlTx for SqlxTransaction {
    async fn commit(&self) -> DbResult<()> {
        self.take().await?.commit().await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.take().await?.rollback().await
    }
}
