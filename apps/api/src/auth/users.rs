use async_trait::async_trait;
use uuid::Uuid;

use crate::db::PgStore;
use crate::models::user::{NewUser, User};

/// Persistence for user identity records. Users are never deleted.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    /// Inserts a user. `None` when the external id or email is already taken.
    async fn insert_if_absent(&self, new_user: NewUser) -> Result<Option<User>, sqlx::Error>;

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), sqlx::Error>;

    async fn update_password_hash(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(self.pool())
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool())
            .await
    }

    async fn insert_if_absent(&self, new_user: NewUser) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, external_id, email, password_hash, auth_provider, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.external_id)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.auth_provider.as_str())
        .bind(new_user.email_verified)
        .fetch_optional(self.pool())
        .await
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE email = $1 RETURNING *",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(self.pool())
        .await
    }
}
