//! File storage port for uploaded resume documents.
//!
//! Stored names are flat (no directories). Every adapter rejects names that could
//! escape its root.

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid stored file name: {0}")]
    InvalidName(String),

    #[error("Stored file not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), StorageError>;

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// URL under which clients can fetch the stored file.
    fn public_url(&self, name: &str) -> String;
}

/// A flat, non-hidden file name. Interior dots (`John..Doe.pdf`) are allowed.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.starts_with('.') || name.contains(|c| c == '/' || c == '\\') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else {
        "application/octet-stream"
    }
}

/// Files in a local directory, exposed to clients under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_path: PathBuf,
}

/// Path prefix the router serves local uploads from.
pub const LOCAL_PUBLIC_PREFIX: &str = "/uploads";

impl LocalFileStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Local file storage initialized");
        Ok(Self { base_path })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::write(&path, &bytes)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write {name}: {e}")))?;
        debug!(name, size = bytes.len(), "Stored file");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(format!("Failed to read {name}: {e}"))),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name, "Deleted stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(format!("Failed to delete {name}: {e}"))),
        }
    }

    fn public_url(&self, name: &str) -> String {
        format!("{LOCAL_PUBLIC_PREFIX}/{name}")
    }
}

/// Files in an S3 (or MinIO) bucket under the `resumes/` prefix.
#[derive(Clone)]
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint: String,
}

impl S3FileStorage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn key_for(&self, name: &str) -> Result<String, StorageError> {
        validate_name(name)?;
        Ok(format!("resumes/{name}"))
    }
}

#[async_trait]
impl FileStorage for S3FileStorage {
    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), StorageError> {
        let key = self.key_for(name)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type_for(name))
            .send()
            .await
            .map_err(|e| StorageError::Io(format!("S3 upload failed: {e}")))?;

        info!(size, "Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key_for(name)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    StorageError::NotFound(name.to_string())
                } else {
                    StorageError::Io(format!("S3 download failed: {e}"))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Io(format!("S3 body read failed: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let key = self.key_for(name)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Io(format!("S3 delete failed: {e}")))?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}/resumes/{}", self.endpoint, self.bucket, name)
    }
}
