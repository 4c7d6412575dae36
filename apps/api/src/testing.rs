//! In-memory fakes of every port, for unit and router tests.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::identity::{IdentityError, IdentityProvider, ProviderIdentity, ProviderSession};
use crate::auth::users::UserRepository;
use crate::config::{Config, StorageConfig};
use crate::llm_client::{CompletionService, LlmError};
use crate::models::profile::{NewProfile, ProfileRow};
use crate::models::resume::{
    NewResume, NewVersion, ResumeDetail, ResumeRecord, ResumeRow, ResumeUpdate, ResumeVersionRow,
};
use crate::models::user::{NewUser, User};
use crate::profile::patch::{PatchValue, ProfilePatch};
use crate::profile::repository::ProfileRepository;
use crate::resumes::repository::ResumeRepository;
use crate::resumes::storage::{validate_name, FileStorage, StorageError};
use crate::state::AppState;

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<User>>,
    pending: Mutex<Option<NewUser>>,
    fail_next_insert: AtomicBool,
}

fn user_from(new_user: NewUser) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        external_id: new_user.external_id,
        email: new_user.email,
        password_hash: new_user.password_hash,
        auth_provider: new_user.auth_provider.as_str().to_string(),
        email_verified: new_user.email_verified,
        created_at: now,
        updated_at: now,
    }
}

impl MemoryUsers {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    /// The next `find_by_external_id` miss inserts `user` before reporting the miss,
    /// as if a concurrent request had won the insert.
    pub fn insert_on_next_lookup_miss(&self, user: NewUser) {
        *self.pending.lock().unwrap() = Some(user);
    }

    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(user) = rows.iter().find(|u| u.external_id == external_id) {
            return Ok(Some(user.clone()));
        }
        if let Some(pending) = self.pending.lock().unwrap().take() {
            rows.push(user_from(pending));
        }
        Ok(None)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_if_absent(&self, new_user: NewUser) -> Result<Option<User>, sqlx::Error> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|u| u.external_id == new_user.external_id || u.email == new_user.email)
        {
            return Ok(None);
        }
        let user = user_from(new_user);
        rows.push(user.clone());
        Ok(Some(user))
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(user) = rows.iter_mut().find(|u| u.id == id) {
            user.email_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.iter_mut().find(|u| u.email == email).map(|user| {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

// ── Identity provider ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FakeAccount {
    subject_id: String,
    email: String,
    password: Option<String>,
    verified: bool,
}

#[derive(Default)]
struct FakeIdentityState {
    accounts: Vec<FakeAccount>,
    tokens: HashMap<String, String>,
    reset_codes: HashMap<String, String>,
    reset_requests: Vec<String>,
    issued: u64,
}

impl FakeIdentityState {
    fn issue_token(&mut self, subject_id: &str) -> String {
        self.issued += 1;
        let token = format!("id-token-{}-{}", subject_id, self.issued);
        self.tokens.insert(token.clone(), subject_id.to_string());
        token
    }

    fn identity_of(account: &FakeAccount) -> ProviderIdentity {
        ProviderIdentity {
            subject_id: account.subject_id.clone(),
            email: account.email.clone(),
            email_verified: account.verified,
        }
    }
}

/// Identity provider whose tokens are opaque strings it issued itself.
#[derive(Default)]
pub struct FakeIdentity {
    state: Mutex<FakeIdentityState>,
    unavailable: AtomicBool,
}

impl FakeIdentity {
    /// Registers a federated account and returns an id-token for it.
    pub fn federated_account(&self, subject_id: &str, email: &str, verified: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.accounts.push(FakeAccount {
            subject_id: subject_id.to_string(),
            email: email.to_string(),
            password: None,
            verified,
        });
        state.issue_token(subject_id)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Marks the account as verified, as clicking the verification link would.
    pub fn verify_email(&self, email: &str) {
        let mut state = self.state.lock().unwrap();
        for account in state.accounts.iter_mut().filter(|a| a.email == email) {
            account.verified = true;
        }
    }

    pub fn reset_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().reset_requests.clone()
    }

    /// The code the reset email would carry.
    pub fn issue_reset_code(&self, email: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.issued += 1;
        let code = format!("oob-{}", state.issued);
        state.reset_codes.insert(code.clone(), email.to_string());
        code
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_token(&self, id_token: &str) -> Result<ProviderIdentity, IdentityError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        let subject_id = state
            .tokens
            .get(id_token)
            .ok_or_else(|| IdentityError::Rejected("INVALID_ID_TOKEN".into()))?;
        state
            .accounts
            .iter()
            .find(|a| &a.subject_id == subject_id)
            .map(FakeIdentityState::identity_of)
            .ok_or_else(|| IdentityError::Rejected("USER_NOT_FOUND".into()))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, IdentityError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state.accounts.iter().any(|a| a.email == email) {
            return Err(IdentityError::EmailExists);
        }
        state.issued += 1;
        let account = FakeAccount {
            subject_id: format!("pw-{}", state.issued),
            email: email.to_string(),
            password: Some(password.to_string()),
            verified: false,
        };
        let identity = FakeIdentityState::identity_of(&account);
        state.accounts.push(account);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, IdentityError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .iter()
            .find(|a| a.email == email && a.password.as_deref() == Some(password))
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("INVALID_LOGIN_CREDENTIALS".into()))?;
        let id_token = state.issue_token(&account.subject_id);
        Ok(ProviderSession {
            id_token,
            identity: FakeIdentityState::identity_of(&account),
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .reset_requests
            .push(email.to_string());
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<String, IdentityError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let email = state
            .reset_codes
            .remove(code)
            .ok_or_else(|| IdentityError::Rejected("INVALID_OOB_CODE".into()))?;
        for account in state.accounts.iter_mut().filter(|a| a.email == email) {
            account.password = Some(new_password.to_string());
        }
        Ok(email)
    }
}

// ── Resumes ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ResumeTables {
    resumes: Vec<ResumeRow>,
    keywords: HashMap<Uuid, BTreeSet<String>>,
    suggestions: HashMap<Uuid, BTreeSet<String>>,
    versions: Vec<ResumeVersionRow>,
}

impl ResumeTables {
    fn record(&self, row: &ResumeRow) -> ResumeRecord {
        let set = |map: &HashMap<Uuid, BTreeSet<String>>| -> Vec<String> {
            map.get(&row.id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        };
        ResumeRecord {
            resume: row.clone(),
            keywords: set(&self.keywords),
            suggestions: set(&self.suggestions),
        }
    }

    fn add_to_set(
        &mut self,
        id: Uuid,
        values: &[String],
        pick: fn(&mut Self) -> &mut HashMap<Uuid, BTreeSet<String>>,
    ) -> Result<u64, sqlx::Error> {
        if !self.resumes.iter().any(|r| r.id == id) {
            return Err(sqlx::Error::RowNotFound);
        }
        let set = pick(self).entry(id).or_default();
        Ok(values.iter().filter(|v| set.insert((*v).clone())).count() as u64)
    }
}

/// Resume store with the same set, ordering and cascade semantics as Postgres.
#[derive(Default)]
pub struct MemoryResumes {
    tables: Mutex<ResumeTables>,
    fail_next_create: AtomicBool,
}

impl MemoryResumes {
    pub fn count(&self) -> usize {
        self.tables.lock().unwrap().resumes.len()
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Keyword, suggestion and version rows across all resumes.
    pub fn child_rows(&self) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.keywords.values().map(BTreeSet::len).sum::<usize>()
            + tables.suggestions.values().map(BTreeSet::len).sum::<usize>()
            + tables.versions.len()
    }
}

#[async_trait]
impl ResumeRepository for MemoryResumes {
    async fn create(&self, new_resume: NewResume) -> Result<ResumeRow, sqlx::Error> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let now = Utc::now();
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id: new_resume.user_id,
            original_file_name: new_resume.original_file_name,
            stored_name: new_resume.stored_name,
            file_url: new_resume.file_url,
            format: new_resume.format.as_str().to_string(),
            content: None,
            current_customization: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().resumes.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeDetail>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.resumes.iter().find(|r| r.id == id).map(|row| {
            let mut versions: Vec<ResumeVersionRow> = tables
                .versions
                .iter()
                .filter(|v| v.resume_id == id)
                .cloned()
                .collect();
            versions.sort_by_key(|v| v.created_at);
            ResumeDetail {
                record: tables.record(row),
                versions,
            }
        }))
    }

    async fn find_by_owner(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let mut records: Vec<ResumeRecord> = tables
            .resumes
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .map(|r| tables.record(r))
            .collect();
        records.sort_by(|a, b| b.resume.created_at.cmp(&a.resume.created_at));
        Ok(records)
    }

    async fn add_keywords(&self, id: Uuid, keywords: &[String]) -> Result<u64, sqlx::Error> {
        if keywords.is_empty() {
            return Ok(0);
        }
        self.tables
            .lock()
            .unwrap()
            .add_to_set(id, keywords, |t| &mut t.keywords)
    }

    async fn add_suggestions(&self, id: Uuid, suggestions: &[String]) -> Result<u64, sqlx::Error> {
        if suggestions.is_empty() {
            return Ok(0);
        }
        self.tables
            .lock()
            .unwrap()
            .add_to_set(id, suggestions, |t| &mut t.suggestions)
    }

    async fn update(
        &self,
        id: Uuid,
        update: ResumeUpdate,
    ) -> Result<Option<ResumeRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.resumes.iter_mut().find(|r| r.id == id).map(|row| {
            if let Some(content) = update.content {
                row.content = Some(content);
            }
            if let Some(customization) = update.current_customization {
                row.current_customization = Some(customization);
            }
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn append_version(
        &self,
        id: Uuid,
        version: NewVersion,
    ) -> Result<Option<ResumeVersionRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let Some(row) = tables.resumes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        row.updated_at = now;

        let version = ResumeVersionRow {
            id: Uuid::new_v4(),
            resume_id: id,
            version_name: version.version_name,
            customizations: version.customizations,
            content: version.content,
            created_at: now,
        };
        tables.versions.push(version.clone());
        Ok(Some(version))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let Some(pos) = tables.resumes.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let row = tables.resumes.remove(pos);
        tables.keywords.remove(&id);
        tables.suggestions.remove(&id);
        tables.versions.retain(|v| v.resume_id != id);
        Ok(Some(row))
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryProfiles {
    rows: Mutex<HashMap<Uuid, ProfileRow>>,
}

fn apply_patch(row: &mut ProfileRow, patch: &ProfilePatch) {
    for (column, value) in patch.changes() {
        match (*column, value.clone()) {
            ("first_name", PatchValue::Text(v)) => row.first_name = v,
            ("last_name", PatchValue::Text(v)) => row.last_name = v,
            ("title", PatchValue::Text(v)) => row.title = v,
            ("bio", PatchValue::Text(v)) => row.bio = v,
            ("phone", PatchValue::Text(v)) => row.phone = v,
            ("location", PatchValue::Text(v)) => row.location = v,
            ("linkedin_url", PatchValue::Text(v)) => row.linkedin_url = v,
            ("github_url", PatchValue::Text(v)) => row.github_url = v,
            ("portfolio_url", PatchValue::Text(v)) => row.portfolio_url = v,
            ("skills", PatchValue::List(v)) => row.skills = v,
            ("experience_years", PatchValue::Int(v)) => row.experience_years = v,
            ("preferred_job_types", PatchValue::List(v)) => row.preferred_job_types = v,
            ("preferred_locations", PatchValue::List(v)) => row.preferred_locations = v,
            (other, _) => panic!("unexpected profile column {other}"),
        }
    }
    row.updated_at = Utc::now();
}

#[async_trait]
impl ProfileRepository for MemoryProfiles {
    async fn create(
        &self,
        user_id: Uuid,
        profile: NewProfile,
    ) -> Result<Option<ProfileRow>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&user_id) {
            return Ok(None);
        }
        let profile = profile.normalized();
        let now = Utc::now();
        let row = ProfileRow {
            id: Uuid::new_v4(),
            user_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            title: profile.title,
            bio: profile.bio,
            phone: profile.phone,
            location: profile.location,
            linkedin_url: profile.linkedin_url,
            github_url: profile.github_url,
            portfolio_url: profile.portfolio_url,
            skills: profile.skills,
            experience_years: profile.experience_years,
            preferred_job_types: profile.preferred_job_types,
            preferred_locations: profile.preferred_locations,
            created_at: now,
            updated_at: now,
        };
        rows.insert(user_id, row.clone());
        Ok(Some(row))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
        Ok(self.rows.lock().unwrap().get(&user_id).cloned())
    }

    async fn update(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<Option<ProfileRow>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&user_id).map(|row| {
            apply_patch(row, patch);
            row.clone()
        }))
    }

    async fn delete(&self, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
        Ok(self.rows.lock().unwrap().remove(&user_id))
    }
}

// ── File storage ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, name: &str) {
        self.files.lock().unwrap().remove(name);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), StorageError> {
        validate_name(name)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("disk full".into()));
        }
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;
        self.get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn public_url(&self, name: &str) -> String {
        format!("/uploads/{name}")
    }
}

// ── Completion ───────────────────────────────────────────────────────────────

/// Completion service with a fixed reply, or a fixed failure.
pub struct ScriptedCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(system, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.reply.clone().ok_or(LlmError::Api {
            status: 529,
            message: "Overloaded".into(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/resume_test".into(),
        anthropic_api_key: "test-anthropic-key".into(),
        identity_api_key: "test-identity-key".into(),
        identity_base_url: "http://127.0.0.1:9".into(),
        storage: StorageConfig::Local {
            upload_dir: PathBuf::from("target/test-uploads"),
        },
        cors_origin: "http://localhost:3000".into(),
        port: 5001,
        rust_log: "debug".into(),
    }
}

/// Owns one of each fake and hands out `AppState`s that share them.
pub struct TestHarness {
    pub users: Arc<MemoryUsers>,
    pub resumes: Arc<MemoryResumes>,
    pub profiles: Arc<MemoryProfiles>,
    pub storage: Arc<MemoryStorage>,
    pub identity: Arc<FakeIdentity>,
    pub completion: Arc<ScriptedCompletion>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_completion(ScriptedCompletion::replying("Match Score: 0.9"))
    }

    pub fn with_completion(completion: ScriptedCompletion) -> Self {
        Self {
            users: Arc::new(MemoryUsers::default()),
            resumes: Arc::new(MemoryResumes::default()),
            profiles: Arc::new(MemoryProfiles::default()),
            storage: Arc::new(MemoryStorage::default()),
            identity: Arc::new(FakeIdentity::default()),
            completion: Arc::new(completion),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            users: self.users.clone(),
            resumes: self.resumes.clone(),
            profiles: self.profiles.clone(),
            storage: self.storage.clone(),
            identity: self.identity.clone(),
            completion: self.completion.clone(),
            config: test_config(),
        }
    }

    /// `Authorization` header value for a verified federated user.
    pub fn bearer(&self, subject_id: &str, email: &str) -> String {
        format!(
            "Bearer {}",
            self.identity.federated_account(subject_id, email, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_rejects_unsafe_names() {
        let storage = MemoryStorage::default();
        for name in ["../escape.pdf", "nested/file.pdf", ".hidden", ""] {
            assert!(matches!(
                storage.write(name, Bytes::from_static(b"x")).await,
                Err(StorageError::InvalidName(_))
            ));
        }
        assert!(storage.is_empty());
        assert!(matches!(
            storage.read("../escape.pdf").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.delete("a\\b.pdf").await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
