//! Authentication error types.

use crate::db::StoreError;
use thiserror::Error;

/// Authentication and account errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Username or email already belongs to an account
    #[error("Account already exists with that email or username")]
    UserExists,

    /// Unknown identifier, wrong password, or unusable refresh token.
    ///
    /// Deliberately coarse: callers never learn which part was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Verified identity no longer resolves to an account
    #[error("Account not found")]
    AccountNotFound,

    /// No bearer token on the request
    #[error("Missing token")]
    MissingToken,

    /// Bad signature, unexpected algorithm, expired or malformed token
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Signing an access token failed
    #[error("Failed to generate token: {0}")]
    TokenGeneration(#[source] jsonwebtoken::errors::Error),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Persistence failure
    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Persistence, hashing and token errors are sanitized to prevent information
    /// disclosure about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Internal(_) | AuthError::HashingFailed => {
                "Internal server error".to_string()
            }
            AuthError::TokenGeneration(_) => "Failed to generate token".to_string(),
            AuthError::InvalidToken(_) => "Invalid token".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the failure is on our side rather than the caller's
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_) | AuthError::HashingFailed | AuthError::TokenGeneration(_)
        )
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
