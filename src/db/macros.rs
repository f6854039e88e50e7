//! Backend identification and dispatch macros.
//!
//! Every sqlx-backed type in this crate is an enum with one variant per
//! backend. The dispatch macro expands to a plain `match`, keeping the
//! per-backend arms readable side by side.

use serde::{Deserialize, Serialize};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
#[doc(hidden)]
macro_rules! impl_db_dispatch {
    ($enum:ident, $value:expr, { $($variant:ident($p:pat) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $enum::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
