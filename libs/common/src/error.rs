//! Database error types shared by both services

use sqlx::{Error as SqlxError, migrate::MigrateError};
use thiserror::Error;

/// Failures while configuring, connecting to or migrating the database
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not connect
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// The embedded schema migrations failed
    #[error("Database migration error: {0}")]
    Migration(#[from] MigrateError),

    /// Invalid `DATABASE_*` settings
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Whether the error is a unique constraint violation
pub fn is_unique_violation(err: &SqlxError) -> bool {
    match err {
        SqlxError::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&SqlxError::RowNotFound));
        assert!(!is_unique_violation(&SqlxError::PoolTimedOut));
    }
}
