//! Error responses.
//!
//! Maps service errors to HTTP statuses with a JSON body of the form
//! `{"error": "<message>"}`. Internal failures are logged in full and answered
//! with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use private_instruction::{auth::AuthError, class::ClassError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Class(#[from] ClassError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::UserExists => StatusCode::CONFLICT,
                AuthError::InvalidCredentials
                | AuthError::MissingToken
                | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::AccountNotFound => StatusCode::NOT_FOUND,
                AuthError::TokenGeneration(_)
                | AuthError::HashingFailed
                | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Class(err) => match err {
                ClassError::Validation(_) => StatusCode::BAD_REQUEST,
                ClassError::ClassNotFound => StatusCode::NOT_FOUND,
                ClassError::Unauthorized => StatusCode::FORBIDDEN,
                ClassError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn is_internal(&self) -> bool {
        match self {
            ApiError::Auth(err) => err.is_internal(),
            ApiError::Class(err) => err.is_internal(),
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.client_message(),
            ApiError::Class(err) => err.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use private_instruction::db::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(AuthError::Validation("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(AuthError::UserExists), StatusCode::CONFLICT),
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::MissingToken), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::AccountNotFound), StatusCode::NOT_FOUND),
            (ApiError::from(ClassError::ClassNotFound), StatusCode::NOT_FOUND),
            (ApiError::from(ClassError::Unauthorized), StatusCode::FORBIDDEN),
            (
                ApiError::from(ClassError::Internal(StoreError::Conflict("c".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::from(AuthError::Internal(StoreError::Conflict(
            "accounts_email_key".into(),
        )));
        assert_eq!(err.client_message(), "Internal server error");
    }
}
