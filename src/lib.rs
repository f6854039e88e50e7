//! fluent-sql: a thin, fluent layer over sqlx.
//!
//! - [`Queryer`] runs SQL text and feeds rows to a [`RowScanner`]
//! - [`Preparer`] scopes a prepared [`Statement`] to a unit of work
//! - [`Database::transaction`] commits on success and always rolls back
//!   otherwise, panics included
//! - [`feed_scanner`] drives a [`RowScanner`] from literal rows in tests
//!
//! Backends are SQLite, PostgreSQL and MySQL through sqlx. The driver
//! traits in [`driver`] let any other connection type sit underneath.

pub mod config;
pub mod database;
pub mod db;
pub mod driver;
pub mod error;
pub mod models;
pub mod preparer;
pub mod queryer;
pub mod scan;
pub mod statement;
pub mod transaction;

pub use config::{ConnectOptions, PoolOptions};
pub use database::Database;
pub use db::{DatabaseType, DbPool};
pub use error::{DbError, DbResult};
pub use models::{FromValue, ScanTarget, Value};
pub use preparer::Preparer;
pub use queryer::Queryer;
pub use scan::{RowScanner, Targets, feed_scanner, scan_into};
pub use statement::{PreparedStatement, Statement};
pub use transaction::Transaction;
