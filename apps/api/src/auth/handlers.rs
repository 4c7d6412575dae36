//! Axum route handlers for `/api/auth`.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::verifier::{self, Session};
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::models::user::{AuthUser, User};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdTokenRequest {
    pub id_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub oob_code: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub is_email_verified: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_email_verified: user.email_verified,
        }
    }
}

fn session_body(message: &str, session: &Session) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "user": UserView::from(&session.user),
        "token": session.token,
    }))
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = verifier::register(
        state.users.as_ref(),
        state.identity.as_ref(),
        &req.email,
        &req.password,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful! Please check your email for verification link.",
            "user": UserView::from(&user),
        })),
    ))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<Value>, AppError> {
    let session = verifier::login(
        state.users.as_ref(),
        state.identity.as_ref(),
        &req.email,
        &req.password,
    )
    .await?;
    Ok(session_body("Login successful", &session))
}

/// POST /api/auth/google-login
pub async fn handle_federated_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<IdTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let session =
        verifier::federated_login(state.users.as_ref(), state.identity.as_ref(), &req.id_token)
            .await?;
    Ok(session_body("Google login successful", &session))
}

/// POST /api/auth/verify-token
pub async fn handle_verify_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<IdTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let session =
        verifier::verify_token(state.users.as_ref(), state.identity.as_ref(), &req.id_token)
            .await?;
    Ok(session_body("Token verified", &session))
}

/// POST /api/auth/forgot-password
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    verifier::forgot_password(state.users.as_ref(), state.identity.as_ref(), &req.email).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Password reset email sent successfully",
    })))
}

/// POST /api/auth/reset-password
pub async fn handle_reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    verifier::reset_password(
        state.users.as_ref(),
        state.identity.as_ref(),
        &req.oob_code,
        &req.new_password,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Password reset successful",
    })))
}

/// GET /api/auth/me
pub async fn handle_me(Extension(user): Extension<AuthUser>) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}
