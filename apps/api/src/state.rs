use std::sync::Arc;

use crate::auth::identity::IdentityProvider;
use crate::auth::users::UserRepository;
use crate::config::Config;
use crate::llm_client::CompletionService;
use crate::profile::repository::ProfileRepository;
use crate::resumes::repository::ResumeRepository;
use crate::resumes::storage::FileStorage;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every collaborator is a port so tests can swap in in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub resumes: Arc<dyn ResumeRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub storage: Arc<dyn FileStorage>,
    pub identity: Arc<dyn IdentityProvider>,
    pub completion: Arc<dyn CompletionService>,
    pub config: Config,
}
