//! Shared application state for `CertDesk` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Every component in it talks to the same
//! document store through its own namespaced, timeout-bounded repository.

use std::sync::Arc;

use certdesk_core::auth::AdminAuth;
use certdesk_core::certificate::CertificateStore;
use certdesk_core::project::ProjectCatalog;
use certdesk_core::repository::Repository;
use certdesk_core::submission::SubmissionInbox;
use certdesk_core::testimonial::TestimonialCatalog;
use certdesk_storage::DocumentStore;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Certificate issuance, listing, and lookup.
    pub certificates: CertificateStore,
    /// Portfolio projects.
    pub projects: ProjectCatalog,
    /// Client testimonials.
    pub testimonials: TestimonialCatalog,
    /// Contact form submissions.
    pub submissions: SubmissionInbox,
    /// Admin sign-in and sessions.
    pub auth: AdminAuth,
}

impl AppState {
    /// Build every component over `store` using `config`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: &ServerConfig) -> Self {
        let repo = Repository::new(store, &config.namespace, config.store_timeout);
        Self::from_parts(
            CertificateStore::new(repo.clone(), config.issuer.clone()),
            AdminAuth::new(repo.clone(), config.auth.clone()),
            repo,
        )
    }

    /// Build the state from an already configured certificate store and
    /// authenticator; the catalogs share `repo`.
    #[must_use]
    pub fn from_parts(certificates: CertificateStore, auth: AdminAuth, repo: Repository) -> Self {
        Self {
            certificates,
            projects: ProjectCatalog::new(repo.clone()),
            testimonials: TestimonialCatalog::new(repo.clone()),
            submissions: SubmissionInbox::new(repo),
            auth,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
