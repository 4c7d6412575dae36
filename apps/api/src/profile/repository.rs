use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::PgStore;
use crate::models::profile::{NewProfile, ProfileRow};
use crate::profile::patch::{PatchValue, ProfilePatch};

/// Persistence for user profiles. At most one profile exists per user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// `None` when the user already has a profile.
    async fn create(
        &self,
        user_id: Uuid,
        profile: NewProfile,
    ) -> Result<Option<ProfileRow>, sqlx::Error>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error>;

    /// Applies the patch and refreshes `updated_at`, even for an empty patch.
    async fn update(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<Option<ProfileRow>, sqlx::Error>;

    async fn delete(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error>;
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn create(
        &self,
        user_id: Uuid,
        profile: NewProfile,
    ) -> Result<Option<ProfileRow>, sqlx::Error> {
        let profile = profile.normalized();
        sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profiles (
                id, user_id, first_name, last_name, title, bio, phone, location,
                linkedin_url, github_url, portfolio_url, skills, experience_years,
                preferred_job_types, preferred_locations
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.title)
        .bind(&profile.bio)
        .bind(&profile.phone)
        .bind(&profile.location)
        .bind(&profile.linkedin_url)
        .bind(&profile.github_url)
        .bind(&profile.portfolio_url)
        .bind(&profile.skills)
        .bind(profile.experience_years)
        .bind(&profile.preferred_job_types)
        .bind(&profile.preferred_locations)
        .fetch_optional(self.pool())
        .await
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
    }

    async fn update(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<Option<ProfileRow>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE user_profiles SET ");
        let mut assignments = query.separated(", ");
        for (column, value) in patch.changes() {
            assignments.push(*column).push_unseparated(" = ");
            match value {
                PatchValue::Text(v) => assignments.push_bind_unseparated(v.clone()),
                PatchValue::List(v) => assignments.push_bind_unseparated(v.clone()),
                PatchValue::Int(v) => assignments.push_bind_unseparated(*v),
            };
        }
        assignments.push("updated_at = NOW()");

        query
            .push(" WHERE user_id = ")
            .push_bind(user_id)
            .push(" RETURNING *");

        query
            .build_query_as::<ProfileRow>()
            .fetch_optional(self.pool())
            .await
    }

    async fn delete(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
        sqlx::query_as::<_, ProfileRow>("DELETE FROM user_profiles WHERE user_id = $1 RETURNING *")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
    }
}
