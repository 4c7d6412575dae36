//! Axum route handlers for `/api/resumes/:id/analyze` and `/api/resumes/:id/enhance`.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::engine;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::user::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeRequest {
    pub job_description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhanceRequest {
    pub job_description: String,
    pub target_areas: Vec<String>,
    pub version_name: Option<String>,
}

/// POST /api/resumes/:id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> Result<Json<Value>, AppError> {
    let analysis = engine::analyze(
        state.resumes.as_ref(),
        state.storage.as_ref(),
        state.completion.as_ref(),
        user.id,
        id,
        &req.job_description,
    )
    .await?;

    Ok(Json(json!({ "success": true, "analysis": analysis })))
}

/// POST /api/resumes/:id/enhance
pub async fn handle_enhance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<EnhanceRequest>,
) -> Result<Json<Value>, AppError> {
    let result = engine::enhance(
        state.resumes.as_ref(),
        state.storage.as_ref(),
        state.completion.as_ref(),
        user.id,
        id,
        &req.job_description,
        &req.target_areas,
        req.version_name,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Resume enhanced successfully",
        "enhancedContent": result.enhanced_content,
        "version": result.version,
    })))
}
