use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Where uploaded resume files are kept.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Files on local disk, served back under `/uploads`.
    Local { upload_dir: PathBuf },
    /// S3 / MinIO bucket.
    S3 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub identity_api_key: String,
    pub identity_base_url: String,
    pub storage: StorageConfig,
    pub cors_origin: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            identity_api_key: require_env("IDENTITY_API_KEY")?,
            identity_base_url: env_or("IDENTITY_BASE_URL", DEFAULT_IDENTITY_BASE_URL),
            storage: storage_from_env()?,
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:3000"),
            port: env_or("PORT", "5001")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn storage_from_env() -> Result<StorageConfig> {
    match env_or("STORAGE_BACKEND", "local").to_ascii_lowercase().as_str() {
        "local" => Ok(StorageConfig::Local {
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
        }),
        "s3" => Ok(StorageConfig::S3 {
            bucket: require_env("S3_BUCKET")?,
            endpoint: require_env("S3_ENDPOINT")?,
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
        }),
        other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
