//! Error types for fluent-sql.
//!
//! Driver failures are carried unchanged in [`DbError::Driver`]; the other
//! variants are produced by this crate itself. [`DbError::NoRows`] is the
//! sentinel returned by every `scan_one` call that saw no rows.

use crate::db::DatabaseType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error reported by the underlying sqlx driver, passed through as-is.
    #[error(transparent)]
    Driver(#[from] sqlx::Error),

    #[error("no rows, expected 1")]
    NoRows,

    #[error("transaction has already been committed or rolled back")]
    TxDone,

    #[error("statement is closed")]
    StatementClosed,

    #[error("failed to scan into column {index}: {source}")]
    Column {
        index: usize,
        #[source]
        source: Box<DbError>,
    },

    #[error("expected {expected} destination targets, got {actual}")]
    TargetCount { expected: usize, actual: usize },

    #[error("cannot convert {from} value into {to}")]
    Conversion {
        from: &'static str,
        to: &'static str,
    },

    #[error("{operation} is not supported by {database}")]
    Unsupported {
        operation: &'static str,
        database: DatabaseType,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap a conversion failure with the index of the offending column.
    pub fn column(index: usize, source: DbError) -> Self {
        Self::Column {
            index,
            source: Box::new(source),
        }
    }

    pub fn conversion(from: &'static str, to: &'static str) -> Self {
        Self::Conversion { from, to }
    }

    pub fn unsupported(operation: &'static str, database: DatabaseType) -> Self {
        Self::Unsupported {
            operation,
            database,
        }
    }

    /// True for the sentinel returned by `scan_one` when no row was produced.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// True when a transaction had already finished before the operation.
    pub fn is_tx_done(&self) -> bool {
        matches!(self, Self::TxDone)
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
