//! Persistence error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// A referenced row does not exist (anymore)
    #[error("Foreign key violated: {0}")]
    ForeignKey(String),

    /// The operation did not finish within the query timeout
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::Conflict(constraint);
            }
            if db_err.is_foreign_key_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::ForeignKey(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_not_conflict() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_conflict_display_names_constraint() {
        let err = StoreError::Conflict("accounts_email_key".to_string());
        assert!(err.to_string().contains("accounts_email_key"));
    }
}
