//! Credential Verifier: turns a bearer credential, or an email/password pair,
//! into a local user.
//!
//! Session tokens are always provider-issued id-tokens, so password sessions and
//! federated sessions pass through the same bearer check.

use tracing::{error, info, instrument, warn};

use crate::auth::identity::{IdentityError, IdentityProvider, ProviderIdentity};
use crate::auth::password::{spawn_hash_password, spawn_verify_password};
use crate::auth::users::UserRepository;
use crate::errors::AppError;
use crate::models::user::{AuthProvider, AuthUser, NewUser, User};

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A local user plus the bearer token the client should present from now on.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or(AppError::Unauthenticated)?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AppError::Unauthenticated)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthenticated);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthenticated);
    }
    Ok(token)
}

/// Verifies a bearer header and resolves it to a local user, creating one on first sight.
pub async fn verify_bearer(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    header: Option<&str>,
) -> Result<AuthUser, AppError> {
    let token = parse_bearer(header)?;
    let provider = verify_with_provider(identity, token).await?;
    let user = resolve_identity(users, &provider).await?;
    Ok(AuthUser {
        id: user.id,
        email: user.email,
        verified: provider.email_verified,
    })
}

async fn verify_with_provider(
    identity: &dyn IdentityProvider,
    token: &str,
) -> Result<ProviderIdentity, AppError> {
    identity.verify_token(token).await.map_err(|e| match e {
        IdentityError::Unavailable(msg) => AppError::Upstream(msg),
        IdentityError::Rejected(_) | IdentityError::EmailExists => AppError::Unauthenticated,
    })
}

/// Looks the provider identity up by subject id and inserts it when unseen.
///
/// The unique constraints on `users` serialize concurrent first requests: the
/// loser's insert returns nothing and it re-reads the winner's row.
pub async fn resolve_identity(
    users: &dyn UserRepository,
    provider: &ProviderIdentity,
) -> Result<User, AppError> {
    if let Some(user) = users.find_by_external_id(&provider.subject_id).await? {
        return Ok(sync_verified_flag(users, user, provider.email_verified).await);
    }

    let new_user = NewUser {
        external_id: provider.subject_id.clone(),
        email: normalize_email(&provider.email),
        password_hash: None,
        auth_provider: AuthProvider::Federated,
        email_verified: provider.email_verified,
    };

    if let Some(user) = users.insert_if_absent(new_user).await? {
        info!(user_id = %user.id, "Created user for new federated identity");
        return Ok(user);
    }

    users
        .find_by_external_id(&provider.subject_id)
        .await?
        .ok_or_else(|| AppError::Conflict("Email is already linked to another account".to_string()))
}

/// Keeps the advisory local flag in step with the provider. Failures are logged only.
async fn sync_verified_flag(users: &dyn UserRepository, mut user: User, verified: bool) -> User {
    if verified && !user.email_verified {
        match users.mark_email_verified(user.id).await {
            Ok(()) => user.email_verified = true,
            Err(e) => warn!(user_id = %user.id, "Failed to sync email verification flag: {e}"),
        }
    }
    user
}

/// Password login for local accounts.
#[instrument(skip(users, identity, password))]
pub async fn login(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<Session, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;
    if !spawn_verify_password(stored_hash, password).await? {
        return Err(AppError::InvalidCredentials);
    }

    let session = identity
        .sign_in(&email, password)
        .await
        .map_err(|e| match e {
            IdentityError::Unavailable(msg) => AppError::Upstream(msg),
            IdentityError::Rejected(_) | IdentityError::EmailExists => {
                AppError::InvalidCredentials
            }
        })?;

    if !session.identity.email_verified {
        return Err(AppError::EmailUnverified);
    }

    let user = sync_verified_flag(users, user, true).await;
    info!(user_id = %user.id, "Password login succeeded");
    Ok(Session {
        user,
        token: session.id_token,
    })
}

/// Registers a password account with the provider and mirrors it locally.
/// No session is issued until the email has been verified and the user logs in.
#[instrument(skip(users, identity, password))]
pub async fn register(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("Email address is invalid".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let provider = identity
        .create_account(&email, password)
        .await
        .map_err(|e| match e {
            IdentityError::EmailExists => AppError::Conflict("Email already registered".to_string()),
            IdentityError::Rejected(msg) => AppError::Validation(msg),
            IdentityError::Unavailable(msg) => AppError::Upstream(msg),
        })?;

    // The provider account exists from here on. A failure below leaves it without a
    // local row: re-registering hits EMAIL_EXISTS and login finds no user.
    let subject_id = provider.subject_id.clone();
    let orphaned = |reason: &dyn std::fmt::Display| {
        error!(
            subject_id = %subject_id,
            email = %email,
            "Provider account created but local user was not stored: {reason}"
        );
    };

    let password_hash = spawn_hash_password(password).await.inspect_err(|e| orphaned(e))?;
    let user = users
        .insert_if_absent(NewUser {
            external_id: provider.subject_id,
            email: email.clone(),
            password_hash: Some(password_hash),
            auth_provider: AuthProvider::Password,
            email_verified: provider.email_verified,
        })
        .await
        .inspect_err(|e| orphaned(e))?
        .ok_or_else(|| {
            orphaned(&"a conflicting local user already exists");
            AppError::Conflict("Email already registered".to_string())
        })?;

    info!(user_id = %user.id, "Registered password account");
    Ok(user)
}

/// Sign-in with a federated id-token; creates the local user on first sight.
#[instrument(skip_all)]
pub async fn federated_login(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    id_token: &str,
) -> Result<Session, AppError> {
    let token = required_token(id_token)?;
    let provider = verify_with_provider(identity, token).await?;
    let user = resolve_identity(users, &provider).await?;
    Ok(Session {
        user,
        token: token.to_string(),
    })
}

/// Checks an id-token against an existing local user without creating one.
#[instrument(skip_all)]
pub async fn verify_token(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    id_token: &str,
) -> Result<Session, AppError> {
    let token = required_token(id_token)?;
    let provider = verify_with_provider(identity, token).await?;
    let user = users
        .find_by_external_id(&provider.subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Session {
        user,
        token: token.to_string(),
    })
}

#[instrument(skip(users, identity))]
pub async fn forgot_password(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    email: &str,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    identity
        .send_password_reset(&email)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))
}

/// Applies a provider reset code and replaces the local password hash.
#[instrument(skip_all)]
pub async fn reset_password(
    users: &dyn UserRepository,
    identity: &dyn IdentityProvider,
    code: &str,
    new_password: &str,
) -> Result<User, AppError> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("Reset code is required".to_string()));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email = identity
        .confirm_password_reset(code.trim(), new_password)
        .await
        .map_err(|e| match e {
            IdentityError::Unavailable(msg) => AppError::Upstream(msg),
            _ => AppError::Validation("Invalid or expired reset code".to_string()),
        })?;

    let password_hash = spawn_hash_password(new_password).await?;
    users
        .update_password_hash(&normalize_email(&email), &password_hash)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn required_token(id_token: &str) -> Result<&str, AppError> {
    let token = id_token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("idToken is required".to_string()));
    }
    Ok(token)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
