use async_trait::async_trait;
use uuid::Uuid;

use crate::db::PgStore;
use crate::models::resume::{
    NewResume, NewVersion, ResumeDetail, ResumeRecord, ResumeRow, ResumeUpdate, ResumeVersionRow,
};

/// Persistence for resumes, their keyword/suggestion sets and version history.
///
/// Keywords and suggestions are sets: re-adding an existing value is a no-op.
/// Deleting a resume removes its versions, keywords and suggestions with it.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn create(&self, new_resume: NewResume) -> Result<ResumeRow, sqlx::Error>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeDetail>, sqlx::Error>;

    /// All resumes owned by `user_id`, newest first.
    async fn find_by_owner(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, sqlx::Error>;

    /// Returns how many keywords were newly added.
    async fn add_keywords(&self, id: Uuid, keywords: &[String]) -> Result<u64, sqlx::Error>;

    /// Returns how many suggestions were newly added.
    async fn add_suggestions(&self, id: Uuid, suggestions: &[String]) -> Result<u64, sqlx::Error>;

    /// Applies a sparse update and refreshes `updated_at`. `None` if the resume is gone.
    async fn update(&self, id: Uuid, update: ResumeUpdate)
        -> Result<Option<ResumeRow>, sqlx::Error>;

    /// Appends a version and refreshes the resume's `updated_at`. `None` if the resume is gone.
    async fn append_version(
        &self,
        id: Uuid,
        version: NewVersion,
    ) -> Result<Option<ResumeVersionRow>, sqlx::Error>;

    async fn delete(&self, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error>;
}

const RECORD_SELECT: &str = r#"
    SELECT r.*,
        COALESCE(array_agg(DISTINCT k.keyword) FILTER (WHERE k.keyword IS NOT NULL), '{}') AS keywords,
        COALESCE(array_agg(DISTINCT s.suggestion) FILTER (WHERE s.suggestion IS NOT NULL), '{}') AS suggestions
    FROM resumes r
    LEFT JOIN resume_keywords k ON k.resume_id = r.id
    LEFT JOIN resume_suggestions s ON s.resume_id = r.id
"#;

#[async_trait]
impl ResumeRepository for PgStore {
    async fn create(&self, new_resume: NewResume) -> Result<ResumeRow, sqlx::Error> {
        sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, user_id, original_file_name, stored_name, file_url, format)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_resume.user_id)
        .bind(&new_resume.original_file_name)
        .bind(&new_resume.stored_name)
        .bind(&new_resume.file_url)
        .bind(new_resume.format.as_str())
        .fetch_one(self.pool())
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeDetail>, sqlx::Error> {
        let record = sqlx::query_as::<_, ResumeRecord>(&format!(
            "{RECORD_SELECT} WHERE r.id = $1 GROUP BY r.id"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let versions = sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE resume_id = $1 ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(ResumeDetail { record, versions }))
    }

    async fn find_by_owner(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRecord>(&format!(
            "{RECORD_SELECT} WHERE r.user_id = $1 GROUP BY r.id ORDER BY r.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    async fn add_keywords(&self, id: Uuid, keywords: &[String]) -> Result<u64, sqlx::Error> {
        if keywords.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO resume_keywords (resume_id, keyword)
            SELECT $1, unnest($2::text[])
            ON CONFLICT (resume_id, keyword) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(keywords)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn add_suggestions(&self, id: Uuid, suggestions: &[String]) -> Result<u64, sqlx::Error> {
        if suggestions.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO resume_suggestions (resume_id, suggestion)
            SELECT $1, unnest($2::text[])
            ON CONFLICT (resume_id, suggestion) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(suggestions)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn update(
        &self,
        id: Uuid,
        update: ResumeUpdate,
    ) -> Result<Option<ResumeRow>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRow>(
            r#"
            UPDATE resumes
            SET content = COALESCE($2, content),
                current_customization = COALESCE($3, current_customization),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.content)
        .bind(update.current_customization)
        .fetch_optional(self.pool())
        .await
    }

    async fn append_version(
        &self,
        id: Uuid,
        version: NewVersion,
    ) -> Result<Option<ResumeVersionRow>, sqlx::Error> {
        // One statement so the version never outlives a concurrent delete of its resume.
        sqlx::query_as::<_, ResumeVersionRow>(
            r#"
            WITH touched AS (
                UPDATE resumes SET updated_at = NOW() WHERE id = $2 RETURNING id
            )
            INSERT INTO resume_versions (id, resume_id, version_name, customizations, content)
            SELECT $1, touched.id, $3, $4, $5 FROM touched
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(&version.version_name)
        .bind(&version.customizations)
        .bind(&version.content)
        .fetch_optional(self.pool())
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRow>("DELETE FROM resumes WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }
}
