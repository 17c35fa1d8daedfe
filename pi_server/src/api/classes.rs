//! Class API handlers.
//!
//! Every route requires an authenticated caller. Membership and role checks
//! happen in [`ClassManager`](private_instruction::ClassManager); handlers only
//! translate between HTTP and the manager.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use private_instruction::{
    Identity,
    class::{
        Class, ClassDetails, ClassError, ClassId, ClassSummary, CreateClassRequest, JoinOutcome,
        UpdateClassRequest,
    },
};
use serde::{Deserialize, Serialize};

use super::{AppState, error::ApiError};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinPayload {
    pub code: String,
}

/// List the caller's classes with the caller's role in each.
pub async fn list_classes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ClassSummary>>, ApiError> {
    let classes = state.classes.list_classes(identity.account_id()).await?;
    Ok(Json(classes))
}

/// Create a class with the caller as admin.
///
/// # Response
///
/// `201 Created` with the class.
pub async fn create_class(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<Class>), ApiError> {
    let class = state
        .classes
        .create_class(identity.account_id(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// Read a class the caller belongs to.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a member
/// - `404 Not Found`: No such class
pub async fn get_class(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(class_id): Path<ClassId>,
) -> Result<Json<ClassDetails>, ApiError> {
    let class = state
        .classes
        .read_class(class_id, identity.account_id())
        .await?;
    Ok(Json(class))
}

/// Rename or re-describe a class. Admins only.
pub async fn update_class(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(class_id): Path<ClassId>,
    Json(payload): Json<UpdateClassRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .classes
        .update_class(class_id, identity.account_id(), payload)
        .await
        .inspect_err(|e| denied(e, &identity, class_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a class. Admins only.
pub async fn delete_class(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(class_id): Path<ClassId>,
) -> Result<StatusCode, ApiError> {
    state
        .classes
        .delete_class(class_id, identity.account_id())
        .await
        .inspect_err(|e| denied(e, &identity, class_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a fresh join code, replacing the class's previous one. Admins only.
///
/// # Response
///
/// `201 Created` with the code and its expiry.
pub async fn generate_join_code(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(class_id): Path<ClassId>,
) -> Result<(StatusCode, Json<JoinCodeResponse>), ApiError> {
    let join_code = state
        .classes
        .generate_join_code(class_id, identity.account_id())
        .await
        .inspect_err(|e| denied(e, &identity, class_id))?;

    Ok((
        StatusCode::CREATED,
        Json(JoinCodeResponse {
            code: join_code.code,
            expires_at: join_code.expires_at,
        }),
    ))
}

/// Redeem a join code.
///
/// # Errors
///
/// - `400 Bad Request`: Empty code
/// - `404 Not Found`: Unknown or expired code
pub async fn join_class(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<JoinPayload>,
) -> Result<Json<JoinOutcome>, ApiError> {
    let result = state
        .classes
        .join_class(identity.account_id(), &payload.code)
        .await;
    metrics::join_code_redemptions_total(result.is_ok());
    Ok(Json(result?))
}

fn denied(err: &ClassError, identity: &Identity, class_id: ClassId) {
    if matches!(err, ClassError::Unauthorized) {
        log_security_event(
            "class_admin_denied",
            Some(identity.account_id()),
            &format!("Admin operation on class {class_id} refused"),
        );
    }
}
