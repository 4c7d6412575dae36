//! Salted password hashing for local (password) accounts.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, error, instrument};

use crate::errors::AppError;

/// Hashes a plain-text password with Argon2 and a fresh random salt.
#[instrument(name = "password::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "Argon2 password hashing failed");
            AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}"))
        })
}

/// Verifies a plain-text password against a stored Argon2 hash.
///
/// `Ok(false)` means the password does not match; a malformed stored hash is an error.
#[instrument(name = "password::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided: &str) -> Result<bool, AppError> {
    if provided.is_empty() {
        return Ok(false);
    }

    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "Stored password hash is malformed");
        AppError::Internal(anyhow::anyhow!("Invalid stored password hash: {e}"))
    })?;

    match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            debug!("Password mismatch");
            Ok(false)
        }
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "Password verification failed: {e}"
        ))),
    }
}

/// Runs [`hash_password`] on the blocking pool so Argon2 never stalls a runtime worker.
pub async fn spawn_hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing task failed: {e}")))?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn spawn_verify_password(stored_hash: &str, provided: &str) -> Result<bool, AppError> {
    let stored_hash = stored_hash.to_string();
    let provided = provided.to_string();
    tokio::task::spawn_blocking(move || verify_password(&stored_hash, &provided))
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Password verification task failed: {e}"))
        })?
}
