//! Resource Authorization Gate.
//!
//! Layered on the protected router: every request must carry a bearer credential
//! that resolves to a user before the handler runs. Handlers read the caller with
//! `Extension<AuthUser>`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::verifier::verify_bearer;
use crate::errors::AppError;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let user = verify_bearer(
        state.users.as_ref(),
        state.identity.as_ref(),
        header.as_deref(),
    )
    .await?;

    debug!(user_id = %user.id, "Request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
