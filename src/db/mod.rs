//! sqlx-backed driver.
//!
//! This module implements the driver traits over sqlx:
//! - Connection pool management
//! - Query execution and row streaming
//! - Prepared statements and transactions
//! - Type mappings and parameter binding
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod executor;
pub mod params;
pub mod pool;
pub mod rows;
pub mod statement;
pub mod transaction;
pub mod types;

pub use executor::SqlxResult;
pub use macros::DatabaseType;
pub use pool::DbPool;
pub use rows::SqlxRows;
pub use statement::SqlxStatement;
pub use transaction::{DbTransaction, SqlxTransaction};
