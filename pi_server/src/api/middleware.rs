//! Authentication middleware for protected endpoints.
//!
//! Extracts the bearer token from the `Authorization` header, verifies it, and
//! inserts the resulting [`Identity`] into request extensions. Handlers learn
//! who is calling only from that extension.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use private_instruction::Identity;
//!
//! async fn protected_handler(Extension(identity): Extension<Identity>) -> String {
//!     format!("Authenticated as account {}", identity.account_id())
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;

/// Authentication middleware that verifies the access token and injects the caller.
///
/// # Behavior
///
/// - **Success**: Token valid → Injects `Identity` into request extensions → Calls next handler
/// - **Missing header or empty token**: Returns `401 Unauthorized`
/// - **Bad signature, wrong algorithm or expired token**: Returns `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.auth.authenticate(header) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(e) => {
            log_security_event("rejected_token", None, &e.to_string());
            Err(e.into())
        }
    }
}
