//! Owner-scoped resume operations shared by the HTTP handlers and the analysis engine.

use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{NewVersion, ResumeDetail, ResumeRow, ResumeUpdate};
use crate::resumes::repository::ResumeRepository;
use crate::resumes::storage::FileStorage;

fn not_found() -> AppError {
    AppError::NotFound("Resume not found".to_string())
}

/// Loads a resume only if `owner_id` owns it. Another user's resume is reported as missing.
pub async fn load_owned(
    resumes: &dyn ResumeRepository,
    owner_id: Uuid,
    resume_id: Uuid,
) -> Result<ResumeDetail, AppError> {
    match resumes.find_by_id(resume_id).await? {
        Some(detail) if detail.resume().user_id == owner_id => Ok(detail),
        _ => Err(not_found()),
    }
}

/// Edits requested through `PUT /api/resumes/:id`.
#[derive(Debug, Clone, Default)]
pub struct ResumeEdit {
    pub version_name: Option<String>,
    pub customizations: Option<Value>,
    pub content: Option<String>,
}

/// Applies an edit and returns the refreshed resume.
///
/// A version name appends a version carrying the supplied content (or the
/// current content). Customizations and content replace the stored values.
#[instrument(skip(resumes, edit), fields(user_id = %owner_id, resume_id = %resume_id))]
pub async fn update_resume(
    resumes: &dyn ResumeRepository,
    owner_id: Uuid,
    resume_id: Uuid,
    edit: ResumeEdit,
) -> Result<ResumeDetail, AppError> {
    let current = load_owned(resumes, owner_id, resume_id).await?;

    let version_name = match edit.version_name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::Validation(
                "Version name must not be empty".to_string(),
            ))
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    if let Some(version_name) = version_name.clone() {
        let version = NewVersion {
            version_name,
            customizations: edit.customizations.clone().unwrap_or_else(|| json!({})),
            content: edit
                .content
                .clone()
                .or_else(|| current.resume().content.clone()),
        };
        resumes
            .append_version(resume_id, version)
            .await?
            .ok_or_else(not_found)?;
    }

    if version_name.is_none() || edit.customizations.is_some() || edit.content.is_some() {
        resumes
            .update(
                resume_id,
                ResumeUpdate {
                    content: edit.content,
                    current_customization: edit.customizations,
                },
            )
            .await?
            .ok_or_else(not_found)?;
    }

    info!("Resume updated");
    load_owned(resumes, owner_id, resume_id).await
}

/// Deletes the resume row, then its stored file. A failed file delete is only logged.
#[instrument(skip(resumes, storage), fields(user_id = %owner_id, resume_id = %resume_id))]
pub async fn delete_resume(
    resumes: &dyn ResumeRepository,
    storage: &dyn FileStorage,
    owner_id: Uuid,
    resume_id: Uuid,
) -> Result<ResumeRow, AppError> {
    load_owned(resumes, owner_id, resume_id).await?;

    let deleted = resumes.delete(resume_id).await?.ok_or_else(not_found)?;

    if let Err(e) = storage.delete(&deleted.stored_name).await {
        warn!(stored_name = %deleted.stored_name, "Failed to delete stored file: {e}");
    }

    info!("Resume deleted");
    Ok(deleted)
}
