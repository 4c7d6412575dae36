//! Analysis Engine: extract resume text, make one completion call, then either
//! decode the reply (analyze) or store it as new content (enhance).

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analysis::extract::extract_text;
use crate::analysis::parser::{parse_analysis, AnalysisResult, RETRY_SUGGESTION};
use crate::analysis::prompts::{analysis_prompt, enhance_prompt, ANALYSIS_SYSTEM, ENHANCE_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::CompletionService;
use crate::models::resume::{NewVersion, ResumeDetail, ResumeUpdate, ResumeVersionRow};
use crate::resumes::repository::ResumeRepository;
use crate::resumes::service::load_owned;
use crate::resumes::storage::FileStorage;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResult {
    pub enhanced_content: String,
    pub version: Option<ResumeVersionRow>,
}

fn require_job_description(job_description: &str) -> Result<&str, AppError> {
    let trimmed = job_description.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Job description is required".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Loads an owned resume and the plain text of its stored document.
async fn load_resume_text(
    resumes: &dyn ResumeRepository,
    storage: &dyn FileStorage,
    owner_id: Uuid,
    resume_id: Uuid,
) -> Result<(ResumeDetail, String), AppError> {
    let detail = load_owned(resumes, owner_id, resume_id).await?;
    let resume = detail.resume();

    let format = resume.document_format().ok_or_else(|| {
        AppError::Extraction(format!("Unsupported stored format '{}'", resume.format))
    })?;

    let bytes = storage
        .read(&resume.stored_name)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let text = extract_text(format, bytes)
        .await
        .map_err(|e| AppError::Extraction(e.to_string()))?;

    Ok((detail, text))
}

/// Scores a resume against a job description and records matched keywords and suggestions.
#[instrument(
    skip(resumes, storage, completion, job_description),
    fields(user_id = %owner_id, resume_id = %resume_id)
)]
pub async fn analyze(
    resumes: &dyn ResumeRepository,
    storage: &dyn FileStorage,
    completion: &dyn CompletionService,
    owner_id: Uuid,
    resume_id: Uuid,
    job_description: &str,
) -> Result<AnalysisResult, AppError> {
    let job_description = require_job_description(job_description)?;
    let (_, resume_text) = load_resume_text(resumes, storage, owner_id, resume_id).await?;

    let reply = completion
        .complete(ANALYSIS_SYSTEM, &analysis_prompt(job_description, &resume_text))
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let result = parse_analysis(&reply);

    let suggestions: Vec<String> = result
        .suggestions
        .iter()
        .filter(|s| s.as_str() != RETRY_SUGGESTION)
        .cloned()
        .collect();
    let new_keywords = resumes.add_keywords(resume_id, &result.key_matches).await?;
    let new_suggestions = resumes.add_suggestions(resume_id, &suggestions).await?;

    info!(
        match_score = result.match_score,
        new_keywords, new_suggestions, "Resume analyzed"
    );
    Ok(result)
}

/// Rewrites a resume for a job description.
///
/// Without a version name the resume's content is overwritten; with one a new
/// version is appended and the content is left alone.
#[instrument(
    skip(resumes, storage, completion, job_description, target_areas),
    fields(user_id = %owner_id, resume_id = %resume_id)
)]
#[allow(clippy::too_many_arguments)]
pub async fn enhance(
    resumes: &dyn ResumeRepository,
    storage: &dyn FileStorage,
    completion: &dyn CompletionService,
    owner_id: Uuid,
    resume_id: Uuid,
    job_description: &str,
    target_areas: &[String],
    version_name: Option<String>,
) -> Result<EnhanceResult, AppError> {
    let job_description = require_job_description(job_description)?;
    let (_, resume_text) = load_resume_text(resumes, storage, owner_id, resume_id).await?;

    let enhanced_content = completion
        .complete(
            ENHANCE_SYSTEM,
            &enhance_prompt(job_description, &resume_text, target_areas),
        )
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let not_found = || AppError::NotFound("Resume not found".to_string());

    let version = match version_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        Some(version_name) => {
            let version = NewVersion {
                version_name,
                customizations: json!({
                    "jobDescription": job_description,
                    "targetAreas": target_areas,
                }),
                content: Some(enhanced_content.clone()),
            };
            let row = resumes
                .append_version(resume_id, version)
                .await?
                .ok_or_else(not_found)?;
            info!(version_id = %row.id, "Enhanced resume saved as version");
            Some(row)
        }
        None => {
            resumes
                .update(
                    resume_id,
                    ResumeUpdate {
                        content: Some(enhanced_content.clone()),
                        current_customization: None,
                    },
                )
                .await?
                .ok_or_else(not_found)?;
            info!("Resume content replaced with enhanced content");
            None
        }
    };

    Ok(EnhanceResult {
        enhanced_content,
        version,
    })
}
