//! Class error types.

use crate::db::StoreError;
use thiserror::Error;

/// Class errors
#[derive(Debug, Error)]
pub enum ClassError {
    /// Malformed or missing input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Class does not exist, or the join code is unknown or expired
    #[error("Class not found")]
    ClassNotFound,

    /// Caller is not a member, or not an admin where one is required
    #[error("Unauthorized")]
    Unauthorized,

    /// Persistence failure
    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
}

impl ClassError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            ClassError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ClassError::Internal(_))
    }
}

/// Result type for class operations
pub type ClassResult<T> = Result<T, ClassError>;
