pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::analysis::handlers as analysis;
use crate::auth::gate::require_auth;
use crate::auth::handlers as auth;
use crate::config::StorageConfig;
use crate::errors::AppError;
use crate::models::resume::MAX_UPLOAD_BYTES;
use crate::profile::handlers as profile;
use crate::resumes::handlers as resumes;
use crate::resumes::storage::LOCAL_PUBLIC_PREFIX;
use crate::state::AppState;

/// Upload body ceiling: the document limit plus room for multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub fn build_router(state: AppState) -> Router {
    // Public auth endpoints
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/google-login", post(auth::handle_federated_login))
        .route("/api/auth/forgot-password", post(auth::handle_forgot_password))
        .route("/api/auth/reset-password", post(auth::handle_reset_password))
        .route("/api/auth/verify-token", post(auth::handle_verify_token));

    // Everything below requires a verified bearer token
    let protected = Router::new()
        .route("/api/auth/me", get(auth::handle_me))
        .route(
            "/api/profile",
            get(profile::handle_get)
                .post(profile::handle_create)
                .put(profile::handle_update)
                .delete(profile::handle_delete),
        )
        .route("/api/resumes", get(resumes::handle_list))
        .route(
            "/api/resumes/upload",
            post(resumes::handle_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/resumes/:id",
            get(resumes::handle_get)
                .put(resumes::handle_update)
                .delete(resumes::handle_delete),
        )
        .route("/api/resumes/:id/analyze", post(analysis::handle_analyze))
        .route("/api/resumes/:id/enhance", post(analysis::handle_enhance))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let mut router = public.merge(protected);

    // Locally stored uploads are served back as static files
    if let StorageConfig::Local { upload_dir } = &state.config.storage {
        router = router.nest_service(LOCAL_PUBLIC_PREFIX, ServeDir::new(upload_dir));
    }

    router.fallback(route_not_found).with_state(state)
}
