//! Identity provider port and its Identity Toolkit (REST v1) adapter.
//!
//! The provider is the authority on who a bearer token belongs to and on whether
//! an email address has been verified. Local user rows mirror it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
}

/// A signed-in provider session. `id_token` is what clients send as their bearer credential.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub id_token: String,
    pub identity: ProviderIdentity,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Credential rejected by identity provider: {0}")]
    Rejected(String),

    #[error("Email already registered with identity provider")]
    EmailExists,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        IdentityError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer id-token to the identity it was issued for.
    async fn verify_token(&self, id_token: &str) -> Result<ProviderIdentity, IdentityError>;

    /// Creates a password account and triggers the provider's verification email.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str)
        -> Result<ProviderSession, IdentityError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    /// Applies a reset code from the reset email. Returns the account's email.
    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<String, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<ToolkitUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolkitUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResetResponse {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ToolkitError {
    error: ToolkitErrorBody,
}

#[derive(Debug, Deserialize)]
struct ToolkitErrorBody {
    message: String,
}

/// Identity Toolkit REST client, authenticated with a project API key.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkitClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, IdentityError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ToolkitError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        debug!(method, status = status.as_u16(), %message, "Identity provider call failed");
        Err(classify_error(status.as_u16(), message))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    async fn verify_token(&self, id_token: &str) -> Result<ProviderIdentity, IdentityError> {
        let lookup: LookupResponse = self.post("lookup", json!({ "idToken": id_token })).await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Rejected("USER_NOT_FOUND".to_string()))?;
        Ok(ProviderIdentity {
            subject_id: user.local_id,
            email: user.email.unwrap_or_default(),
            email_verified: user.email_verified,
        })
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, IdentityError> {
        let created: SignInResponse = self
            .post(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        let _: Value = self
            .post(
                "sendOobCode",
                json!({ "requestType": "VERIFY_EMAIL", "idToken": created.id_token }),
            )
            .await?;

        Ok(ProviderIdentity {
            subject_id: created.local_id,
            email: created.email.unwrap_or_else(|| email.to_string()),
            email_verified: false,
        })
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let signed_in: SignInResponse = self
            .post(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        // signInWithPassword does not report verification state; a lookup with the
        // fresh token does.
        let identity = self.verify_token(&signed_in.id_token).await?;
        Ok(ProviderSession {
            id_token: signed_in.id_token,
            identity,
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let _: Value = self
            .post(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<String, IdentityError> {
        let reset: ResetResponse = self
            .post(
                "resetPassword",
                json!({ "oobCode": code, "newPassword": new_password }),
            )
            .await?;
        Ok(reset.email)
    }
}

/// Maps a failed Identity Toolkit response onto the port's error type.
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be ...`.
fn classify_error(status: u16, message: String) -> IdentityError {
    if status == 429 || status >= 500 {
        IdentityError::Unavailable(format!("status {status}: {message}"))
    } else if message.starts_with("EMAIL_EXISTS") {
        IdentityError::EmailExists
    } else {
        IdentityError::Rejected(message)
    }
}
