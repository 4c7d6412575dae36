//! Document ingestion: validate an uploaded file, store it, record it.

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{DocumentFormat, NewResume, ResumeRow, MAX_UPLOAD_BYTES};
use crate::resumes::repository::ResumeRepository;
use crate::resumes::storage::FileStorage;

const MAX_SANITIZED_LEN: usize = 100;

/// Checks the upload's extension and size. Nothing is written for a rejected upload.
pub fn validate_upload(file_name: &str, size: usize) -> Result<DocumentFormat, AppError> {
    let format = DocumentFormat::from_file_name(file_name).ok_or(AppError::InvalidFileType)?;
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::FileTooLarge {
            max: MAX_UPLOAD_BYTES,
        });
    }
    if size == 0 {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    Ok(format)
}

/// Stores `bytes` under a fresh name and creates the Resume row owned by `owner_id`.
///
/// If the row cannot be created the stored file is removed again.
#[instrument(skip(resumes, storage, bytes), fields(user_id = %owner_id, size = bytes.len()))]
pub async fn ingest(
    resumes: &dyn ResumeRepository,
    storage: &dyn FileStorage,
    owner_id: Uuid,
    bytes: Bytes,
    file_name: &str,
) -> Result<ResumeRow, AppError> {
    let format = validate_upload(file_name, bytes.len())?;
    let stored_name = stored_name_for(file_name);

    storage
        .write(&stored_name, bytes)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let new_resume = NewResume {
        user_id: owner_id,
        original_file_name: file_name.to_string(),
        stored_name: stored_name.clone(),
        file_url: storage.public_url(&stored_name),
        format,
    };

    match resumes.create(new_resume).await {
        Ok(row) => {
            info!(resume_id = %row.id, stored_name = %row.stored_name, "Resume ingested");
            Ok(row)
        }
        Err(e) => {
            if let Err(cleanup) = storage.delete(&stored_name).await {
                warn!(stored_name = %stored_name, "Failed to remove orphaned upload: {cleanup}");
            }
            Err(AppError::Database(e))
        }
    }
}

/// `<unix-millis>-<8 hex>-<sanitized name>`.
pub fn stored_name_for(file_name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        sanitize_file_name(file_name)
    )
}

/// Drops directory components and replaces anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);

    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.len() > MAX_SANITIZED_LEN {
        let cut = sanitized.len() - MAX_SANITIZED_LEN;
        sanitized = sanitized.split_off(cut);
    }

    // Collapse dot runs, then drop leading dots so the name is never hidden.
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() {
        "resume".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryResumes, MemoryStorage};

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Resume (1).pdf"), "My_Resume__1_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_file_name("..."), "resume");
        assert_eq!(sanitize_file_name("John..Doe.pdf"), "John.Doe.pdf");
        assert_eq!(sanitize_file_name("resume...pdf"), "resume.pdf");
    }

    #[tokio::test]
    async fn test_double_dot_names_ingest() {
        let resumes = MemoryResumes::default();
        let storage = MemoryStorage::default();

        let row = ingest(
            &resumes,
            &storage,
            Uuid::new_v4(),
            Bytes::from_static(b"%PDF-1.4"),
            "John..Doe.pdf",
        )
        .await
        .unwrap();

        assert!(row.stored_name.ends_with("-John.Doe.pdf"));
        assert_eq!(row.original_file_name, "John..Doe.pdf");
        assert!(storage.get(&row.stored_name).is_some());
    }

    #[test]
    fn test_long_names_keep_extension() {
        let name = format!("{}.pdf", "a".repeat(300));
        let sanitized = sanitize_file_name(&name);
        assert_eq!(sanitized.len(), MAX_SANITIZED_LEN);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn test_stored_names_are_unique() {
        let a = stored_name_for("cv.pdf");
        let b = stored_name_for("cv.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("-cv.pdf"));
        assert!(DocumentFormat::from_file_name(&a).is_some());
    }

    #[tokio::test]
    async fn test_ingest_stores_bytes_and_creates_row() {
        let resumes = MemoryResumes::default();
        let storage = MemoryStorage::default();
        let owner = Uuid::new_v4();
        let bytes = b"%PDF-1.4 resume body".to_vec();

        let row = ingest(&resumes, &storage, owner, Bytes::from(bytes.clone()), "Resume.PDF")
            .await
            .unwrap();

        assert_eq!(row.user_id, owner);
        assert_eq!(row.original_file_name, "Resume.PDF");
        assert_eq!(row.format, "PDF");
        assert!(row.content.is_none());
        assert_eq!(row.file_url, storage.public_url(&row.stored_name));
        assert_eq!(storage.get(&row.stored_name), Some(bytes));
        assert_eq!(resumes.count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_uploads_write_nothing() {
        let resumes = MemoryResumes::default();
        let storage = MemoryStorage::default();
        let owner = Uuid::new_v4();

        let err = ingest(&resumes, &storage, owner, Bytes::from_static(b"data"), "resume.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFileType));

        let oversized = Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        let err = ingest(&resumes, &storage, owner, oversized, "resume.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge { .. }));

        let err = ingest(&resumes, &storage, owner, Bytes::new(), "resume.docx")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(storage.len(), 0);
        assert_eq!(resumes.count(), 0);
    }

    #[test]
    fn test_extension_checked_before_size() {
        let oversized = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            validate_upload("resume.exe", oversized.len()),
            Err(AppError::InvalidFileType)
        ));
        assert!(validate_upload("resume.pdf", MAX_UPLOAD_BYTES).is_ok());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_file() {
        let resumes = MemoryResumes::default();
        resumes.fail_next_create();
        let storage = MemoryStorage::default();

        let err = ingest(&resumes, &storage, Uuid::new_v4(), Bytes::from_static(b"PK docx"), "cv.docx")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(storage.len(), 0);
        assert_eq!(resumes.count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_creates_no_row() {
        let resumes = MemoryResumes::default();
        let storage = MemoryStorage::default();
        storage.fail_writes(true);

        let err = ingest(&resumes, &storage, Uuid::new_v4(), Bytes::from_static(b"%PDF"), "cv.pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(resumes.count(), 0);
    }
}
