//! Authentication API handlers.
//!
//! This module provides HTTP REST endpoints for the credential lifecycle:
//! - Sign-up with username, password and email
//! - Sign-in by username or email, returning an access token and a refresh secret
//! - Refresh, which rotates the refresh secret and issues a new access token
//! - Sign-out, which ends the session a refresh secret belongs to
//!
//! # Examples
//!
//! Sign up:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/signup \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "password": "pw1", "email": "alice@example.com"}'
//! ```
//!
//! Refresh once the access token has expired:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/refresh \
//!   -H "Authorization: Bearer <expired access token>" \
//!   -H "Content-Type: application/json" \
//!   -d '{"refresh_token": "<refresh secret>"}'
//! ```

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};
use chrono::{DateTime, Utc};
use private_instruction::{
    Identity,
    auth::{Account, AccountId, AuthError, BearerToken, SessionTokens, SignInRequest, SignUpRequest},
};
use serde::{Deserialize, Serialize};

use super::{AppState, error::ApiError, request_id::RequestId};
use crate::{logging::log_security_event, metrics};

/// Tokens returned by sign-in and refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub account_id: AccountId,
    pub username: String,
}

impl AuthResponse {
    fn new(account_id: AccountId, username: String, tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            refresh_token_expires_at: tokens.refresh_token_expires_at,
            account_id,
            username,
        }
    }
}

/// Body of refresh and sign-out requests
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

/// Create a new account.
///
/// # Response
///
/// `201 Created` with the account (no credentials).
///
/// # Errors
///
/// - `400 Bad Request`: Malformed username, email or empty password
/// - `409 Conflict`: Username or email already taken
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state.auth.sign_up(payload).await?;
    metrics::signups_total();
    Ok((StatusCode::CREATED, Json(account)))
}

/// Authenticate with username or email and password.
///
/// `username` takes precedence when both identifiers are given.
///
/// # Errors
///
/// - `400 Bad Request`: No identifier or empty password
/// - `401 Unauthorized`: Unknown identifier or wrong password, indistinguishably
pub async fn signin(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let identifier = payload
        .username
        .clone()
        .or_else(|| payload.email.clone())
        .unwrap_or_default();

    match state.auth.sign_in(payload).await {
        Ok((account, tokens)) => {
            metrics::signin_attempts_total(true);
            Ok(Json(AuthResponse::new(account.id, account.username, tokens)))
        }
        Err(e) => {
            metrics::signin_attempts_total(false);
            if matches!(e, AuthError::InvalidCredentials) {
                tracing::info!(%request_id, "Failed sign-in");
                log_security_event("signin_failed", None, &format!("identifier {identifier:?}"));
            }
            Err(e.into())
        }
    }
}

/// Exchange a refresh secret for a new access token and a rotated secret.
///
/// The caller's (possibly expired) access token in the `Authorization` header
/// names the account; the refresh secret in the body authenticates it.
///
/// # Errors
///
/// - `400 Bad Request`: Empty refresh secret
/// - `401 Unauthorized`: Missing bearer token, or the secret is unknown,
///   expired or already rotated
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let BearerToken::Extracted(access_token) = BearerToken::from_header(header) else {
        return Err(AuthError::MissingToken.into());
    };

    let result = async {
        let account_id = state.auth.account_id_from_expired_token(access_token)?;
        let refreshed = state
            .auth
            .refresh_access_token(&payload.refresh_token, account_id)
            .await;
        if refreshed.is_err() {
            log_security_event("refresh_rejected", Some(account_id), "Refresh secret not accepted");
        }
        let (account, tokens) = refreshed?;
        Ok::<_, AuthError>(AuthResponse::new(account.id, account.username, tokens))
    }
    .await;

    metrics::token_refresh_total(result.is_ok());
    Ok(Json(result?))
}

/// End the session the given refresh secret belongs to.
///
/// # Errors
///
/// - `401 Unauthorized`: The secret matches none of the caller's sessions
pub async fn signout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<RefreshPayload>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .sign_out(identity.account_id(), &payload.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
