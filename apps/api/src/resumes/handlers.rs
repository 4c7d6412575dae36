//! Axum route handlers for `/api/resumes`.

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::resume::MAX_UPLOAD_BYTES;
use crate::models::user::AuthUser;
use crate::resumes::ingest::{ingest, validate_upload};
use crate::resumes::service::{self, ResumeEdit};
use crate::state::AppState;

/// Multipart field that carries the document.
pub const UPLOAD_FIELD: &str = "resume";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateResumeRequest {
    pub version_name: Option<String>,
    pub customizations: Option<Value>,
    pub content: Option<String>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge {
            max: MAX_UPLOAD_BYTES,
        }
    } else {
        AppError::Validation(e.body_text())
    }
}

/// POST /api/resumes/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;

        // Reject by extension before buffering the body.
        validate_upload(&file_name, 1)?;

        let data = field.bytes().await.map_err(multipart_error)?;
        let resume = ingest(
            state.resumes.as_ref(),
            state.storage.as_ref(),
            user.id,
            data,
            &file_name,
        )
        .await?;

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Resume uploaded successfully",
                "resume": resume,
            })),
        ));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}

/// GET /api/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let resumes = state.resumes.find_by_owner(user.id).await?;
    Ok(Json(json!({ "success": true, "resumes": resumes })))
}

/// GET /api/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let resume = service::load_owned(state.resumes.as_ref(), user.id, id).await?;
    Ok(Json(json!({ "success": true, "resume": resume })))
}

/// PUT /api/resumes/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateResumeRequest>,
) -> Result<Json<Value>, AppError> {
    let edit = ResumeEdit {
        version_name: req.version_name,
        customizations: req.customizations,
        content: req.content,
    };
    let resume = service::update_resume(state.resumes.as_ref(), user.id, id, edit).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Resume updated successfully",
        "resume": resume,
    })))
}

/// DELETE /api/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let deleted =
        service::delete_resume(state.resumes.as_ref(), state.storage.as_ref(), user.id, id)
            .await?;
    info!(resume_id = %deleted.id, "Resume removed via API");
    Ok(Json(json!({
        "success": true,
        "message": "Resume deleted successfully",
    })))
}
