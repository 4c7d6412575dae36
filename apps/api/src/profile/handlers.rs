//! Axum route handlers for `/api/profile`.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::models::profile::NewProfile;
use crate::models::user::AuthUser;
use crate::profile::patch::ProfilePatch;
use crate::state::AppState;

fn profile_not_found() -> AppError {
    AppError::NotFound("Profile not found".to_string())
}

/// GET /api/profile
pub async fn handle_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let profile = state
        .profiles
        .find_by_user(user.id)
        .await?
        .ok_or_else(profile_not_found)?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

/// POST /api/profile
pub async fn handle_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<NewProfile>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let profile = state
        .profiles
        .create(user.id, req)
        .await?
        .ok_or_else(|| AppError::Conflict("Profile already exists".to_string()))?;

    info!(user_id = %user.id, "Profile created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "profile": profile })),
    ))
}

/// PUT /api/profile
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>, AppError> {
    let fields = body
        .as_object()
        .ok_or_else(|| AppError::Validation("Profile update must be a JSON object".to_string()))?;
    let patch = ProfilePatch::from_json(fields)?;

    let profile = state
        .profiles
        .update(user.id, &patch)
        .await?
        .ok_or_else(profile_not_found)?;

    info!(user_id = %user.id, fields = patch.changes().len(), "Profile updated");
    Ok(Json(json!({ "success": true, "profile": profile })))
}

/// DELETE /api/profile
pub async fn handle_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    state
        .profiles
        .delete(user.id)
        .await?
        .ok_or_else(profile_not_found)?;

    info!(user_id = %user.id, "Profile deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Profile deleted successfully",
    })))
}
