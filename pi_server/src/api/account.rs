//! Account API handlers.
//!
//! All routes act on the authenticated caller's own account.

use axum::{Extension, Json, extract::State, http::StatusCode};
use private_instruction::{
    Identity,
    account::UpdateAccountRequest,
    auth::{Account, UpdatePasswordRequest},
};

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;

/// Read the caller's account.
///
/// # Errors
///
/// - `404 Not Found`: The account was deleted after the token was issued
pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Account>, ApiError> {
    let account = state.accounts.read_account(identity.account_id()).await?;
    Ok(Json(account))
}

/// Change username and email.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed username or email
/// - `404 Not Found`: No such account
/// - `409 Conflict`: Username or email taken by another account
pub async fn update_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .update_account(identity.account_id(), payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete the caller's account along with its sessions and memberships.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete_account(identity.account_id()).await?;
    log_security_event("account_deleted", Some(identity.account_id()), "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Change the password after checking the current one.
///
/// # Errors
///
/// - `400 Bad Request`: Empty new password
/// - `401 Unauthorized`: Wrong current password
pub async fn update_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .update_password(identity.account_id(), payload)
        .await?;
    log_security_event("password_changed", Some(identity.account_id()), "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
