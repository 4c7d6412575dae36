use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Upload ceiling for resume documents (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Case-insensitive match on the file extension. Anything but `.pdf` / `.docx` is `None`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::parse(ext)
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("pdf") {
            Some(DocumentFormat::Pdf)
        } else if value.eq_ignore_ascii_case("docx") {
            Some(DocumentFormat::Docx)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_file_name: String,
    #[serde(skip_serializing, default)]
    pub stored_name: String,
    pub file_url: String,
    pub format: String,
    pub content: Option<String>,
    pub current_customization: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    pub fn document_format(&self) -> Option<DocumentFormat> {
        DocumentFormat::parse(&self.format)
    }
}

/// A resume row together with its keyword and suggestion sets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub resume: ResumeRow,
    pub keywords: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeVersionRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub version_name: String,
    pub customizations: Value,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full resume view: row, keyword/suggestion sets and version history (oldest first).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub record: ResumeRecord,
    pub versions: Vec<ResumeVersionRow>,
}

impl ResumeDetail {
    pub fn resume(&self) -> &ResumeRow {
        &self.record.resume
    }
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub user_id: Uuid,
    pub original_file_name: String,
    pub stored_name: String,
    pub file_url: String,
    pub format: DocumentFormat,
}

/// Sparse resume update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ResumeUpdate {
    pub content: Option<String>,
    pub current_customization: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version_name: String,
    pub customizations: Value,
    pub content: Option<String>,
}
