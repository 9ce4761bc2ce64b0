//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                 │
//! │                                                                      │
//! │  SQLite Error (sqlx::Error)                                          │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  DbError (this module) ← adds context and categorization             │
//! │       ▲                                                              │
//! │       │                                                              │
//! │  CoreError (caravel-core) ← business rule violations pass through    │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  Caller maps to user-facing message; recoverable variants leave      │
//! │  state unchanged (the enclosing transaction rolled back)             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use caravel_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// Wraps sqlx errors with context, and carries domain errors transparently
/// so protocol operations surface `InsufficientStock`, `EmptyCart` etc.
/// without an extra layer of wrapping.
#[derive(Debug, Error)]
pub enum DbError {
    /// Business rule violation raised inside a database operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate item name or account name
    /// - Duplicate debtor phone, duplicate payment-method tag
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// CSV serialization failed during an export.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<csv::Error> for DbError {
    fn from(err: csv::Error) -> Self {
        DbError::ExportFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_passes_through() {
        let core = CoreError::EmptyCart {
            shop: "s1".to_string(),
        };
        let db: DbError = core.into();
        assert_eq!(db.to_string(), "Cart for shop s1 is empty");
        assert!(matches!(db, DbError::Domain(CoreError::EmptyCart { .. })));
    }

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Item", "abc");
        assert_eq!(err.to_string(), "Item not found: abc");
    }
}
