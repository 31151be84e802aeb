//! Admin authentication.
//!
//! A single configured email address is the admin. It can sign in two ways:
//!
//! - Email and password. The password is checked against a configured
//!   Argon2 PHC string, so the hash carries its own salt and cost.
//! - A one-time sign-in link, valid for 15 minutes, handed to a
//!   [`LinkSender`] for delivery.
//!
//! Either way the admin receives a session token: a UUID v4 returned once
//! and stored only as `SHA-256(token)`, which is also the session document
//! id. Link tokens are stored the same way.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::AuthError;
use crate::normalize;
use crate::repository::{from_document, to_fields, Repository};

/// Collection holding active sessions.
pub const SESSIONS: &str = "admin_sessions";

/// Collection holding unused sign-in links.
pub const LINKS: &str = "admin_links";

/// Lifetime of a sign-in link, in minutes.
pub const LINK_TTL_MINUTES: i64 = 15;

/// Default session lifetime, in hours.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Admin sign-in settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The one email allowed into the admin area. `None` disables sign-in.
    pub admin_email: Option<String>,
    /// Argon2 PHC string of the admin password (`$argon2id$v=19$...`).
    /// `None` disables password sign-in.
    pub password_hash: Option<String>,
    pub session_ttl: Duration,
    pub link_ttl: Duration,
    /// Origin sign-in links point at.
    pub link_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            password_hash: None,
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            link_ttl: Duration::minutes(LINK_TTL_MINUTES),
            link_base: "http://localhost:8080".to_owned(),
        }
    }
}

/// Delivers sign-in links to the admin.
#[async_trait::async_trait]
pub trait LinkSender: Send + Sync {
    /// Deliver `url` to `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] if delivery fails.
    async fn send(&self, email: &str, url: &str) -> Result<(), AuthError>;
}

/// Writes sign-in links to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLinkSender;

#[async_trait::async_trait]
impl LinkSender for LogLinkSender {
    async fn send(&self, email: &str, url: &str) -> Result<(), AuthError> {
        info!(%email, %url, "sign-in link issued");
        Ok(())
    }
}

/// A stored session or sign-in link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub email: String,
    #[serde(with = "normalize::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "normalize::timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    fn starting_now(email: &str, ttl: Duration) -> Self {
        let created_at = normalize::now();
        Self {
            email: email.to_owned(),
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Whether the session has run out.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A fresh session. `token` is shown once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub session: AdminSession,
}

/// Admin sign-in, session lookup, and sign-out.
#[derive(Clone)]
pub struct AdminAuth {
    repo: Repository,
    config: AuthConfig,
    sender: Arc<dyn LinkSender>,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("admin_email", &self.config.admin_email)
            .finish_non_exhaustive()
    }
}

impl AdminAuth {
    /// Create an authenticator that logs sign-in links.
    #[must_use]
    pub fn new(repo: Repository, config: AuthConfig) -> Self {
        Self::with_sender(repo, config, Arc::new(LogLinkSender))
    }

    #[must_use]
    pub fn with_sender(repo: Repository, config: AuthConfig, sender: Arc<dyn LinkSender>) -> Self {
        Self {
            repo,
            config,
            sender,
        }
    }

    /// Whether `email` is the configured admin address. Case and
    /// surrounding whitespace are ignored.
    #[must_use]
    pub fn is_authorized_email(&self, email: &str) -> bool {
        self.config
            .admin_email
            .as_deref()
            .is_some_and(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotConfigured`] if no admin email or password hash is
    ///   set, or the hash is not a valid PHC string.
    /// - [`AuthError::Unauthorized`] if the password is wrong.
    /// - [`AuthError::AccessDenied`] if the email is not the admin's.
    /// - A store error if the session cannot be written.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        if self.config.admin_email.is_none() {
            return Err(AuthError::NotConfigured {
                method: "admin email",
            });
        }
        let phc = self
            .config
            .password_hash
            .as_deref()
            .ok_or(AuthError::NotConfigured { method: "password" })?;
        let expected = PasswordHash::new(phc.trim()).map_err(|err| {
            warn!(%err, "configured admin password hash is not a valid PHC string");
            AuthError::NotConfigured { method: "password" }
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &expected)
            .is_err()
        {
            warn!(email = %email.trim(), "admin sign-in rejected: bad credentials");
            return Err(AuthError::Unauthorized {
                reason: "invalid email or password".to_owned(),
            });
        }
        self.ensure_admin(email)?;

        let signed_in = self.start_session(email.trim()).await?;
        info!(email = %signed_in.session.email, "admin signed in with password");
        Ok(signed_in)
    }

    /// Send a one-time sign-in link to the admin.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotConfigured`] if no admin email is set.
    /// - [`AuthError::AccessDenied`] if `email` is not the admin's.
    /// - A store or delivery error.
    pub async fn request_link(&self, email: &str) -> Result<(), AuthError> {
        if self.config.admin_email.is_none() {
            return Err(AuthError::NotConfigured {
                method: "email link",
            });
        }
        self.ensure_admin(email)?;

        let token = uuid::Uuid::new_v4().to_string();
        let link = AdminSession::starting_now(email.trim(), self.config.link_ttl);
        self.repo
            .set(LINKS, &hash_token(&token), to_fields(&link)?)
            .await?;

        let url = format!(
            "{}/admin/link/{token}",
            self.config.link_base.trim_end_matches('/')
        );
        self.sender.send(&link.email, &url).await
    }

    /// Exchange a sign-in link token for a session. The link is used up
    /// whether or not it is still valid.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthorized`] if the link is unknown, used, or
    ///   expired.
    /// - [`AuthError::AccessDenied`] if the admin email changed since the
    ///   link was sent.
    /// - A store error.
    pub async fn consume_link(&self, token: &str) -> Result<SignedIn, AuthError> {
        let id = hash_token(token.trim());
        let doc = self
            .repo
            .get(LINKS, &id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized {
                reason: "unknown or already used sign-in link".to_owned(),
            })?;
        self.repo.delete(LINKS, &id).await?;

        let link: AdminSession = from_document(doc)?;
        if link.is_expired() {
            return Err(AuthError::Unauthorized {
                reason: "sign-in link expired".to_owned(),
            });
        }
        self.ensure_admin(&link.email)?;

        let signed_in = self.start_session(&link.email).await?;
        info!(email = %signed_in.session.email, "admin signed in with email link");
        Ok(signed_in)
    }

    /// Resolve a session token to the signed-in admin.
    ///
    /// Expired sessions are removed on sight.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthorized`] if the token is unknown or expired.
    /// - [`AuthError::AccessDenied`] if the session's email is no longer
    ///   the admin's.
    /// - A store error.
    pub async fn authenticate(&self, token: &str) -> Result<AdminSession, AuthError> {
        let id = hash_token(token);
        let doc = self
            .repo
            .get(SESSIONS, &id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized {
                reason: "invalid or expired session".to_owned(),
            })?;
        let session: AdminSession = from_document(doc)?;

        if session.is_expired() {
            self.repo.delete(SESSIONS, &id).await?;
            return Err(AuthError::Unauthorized {
                reason: "invalid or expired session".to_owned(),
            });
        }
        self.ensure_admin(&session.email)?;
        Ok(session)
    }

    /// End a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.repo.delete(SESSIONS, &hash_token(token)).await?;
        info!("admin signed out");
        Ok(())
    }

    fn ensure_admin(&self, email: &str) -> Result<(), AuthError> {
        if self.is_authorized_email(email) {
            Ok(())
        } else {
            warn!(email = %email.trim(), "admin access denied");
            Err(AuthError::AccessDenied {
                email: email.trim().to_owned(),
            })
        }
    }

    async fn start_session(&self, email: &str) -> Result<SignedIn, AuthError> {
        let token = uuid::Uuid::new_v4().to_string();
        let session = AdminSession::starting_now(email, self.config.session_ttl);
        self.repo
            .set(SESSIONS, &hash_token(&token), to_fields(&session)?)
            .await?;
        Ok(SignedIn { token, session })
    }
}

/// Check that `phc` parses as a password hash [`AdminAuth::sign_in`] can
/// verify against.
///
/// # Errors
///
/// Returns [`AuthError::NotConfigured`] if it does not.
pub fn check_password_hash(phc: &str) -> Result<(), AuthError> {
    PasswordHash::new(phc.trim())
        .map(|_| ())
        .map_err(|_| AuthError::NotConfigured { method: "password" })
}

/// Hash a token for storage (SHA-256, hex-encoded). Tokens are random
/// UUIDs, so a fast digest is enough; passwords go through Argon2.
#[must_use]
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use certdesk_storage::{DocumentStore, MemoryStore};

    use crate::repository::DEFAULT_STORE_TIMEOUT;

    use argon2::password_hash::{PasswordHasher, SaltString};
    use argon2::{Algorithm, Params, Version};

    /// Argon2id PHC string for `password`, at minimum cost to keep tests fast.
    fn phc(password: &str) -> String {
        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(Params::MIN_M_COST, 1, 1, None).unwrap(),
        );
        let salt = SaltString::encode_b64(b"certdesk-test-salt").unwrap();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[derive(Default)]
    struct CapturingSender(Mutex<Vec<(String, String)>>);

    #[async_trait::async_trait]
    impl LinkSender for CapturingSender {
        async fn send(&self, email: &str, url: &str) -> Result<(), AuthError> {
            self.0.lock().unwrap().push((email.to_owned(), url.to_owned()));
            Ok(())
        }
    }

    fn config() -> AuthConfig {
        AuthConfig {
            admin_email: Some("Admin@Example.com".into()),
            password_hash: Some(phc("correct horse")),
            link_base: "https://example.com/".into(),
            ..AuthConfig::default()
        }
    }

    fn auth_with(config: AuthConfig) -> (Arc<MemoryStore>, Arc<CapturingSender>, AdminAuth) {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(CapturingSender::default());
        let repo = Repository::new(store.clone(), "ns", DEFAULT_STORE_TIMEOUT);
        let auth = AdminAuth::with_sender(repo, config, sender.clone());
        (store, sender, auth)
    }

    #[test]
    fn email_match_ignores_case_and_whitespace() {
        let (_, _, auth) = auth_with(config());
        assert!(auth.is_authorized_email("  admin@example.COM "));
        assert!(!auth.is_authorized_email("someone@example.com"));
    }

    #[tokio::test]
    async fn password_sign_in_creates_hashed_session() {
        let (store, _, auth) = auth_with(config());
        let signed_in = auth.sign_in("admin@example.com", "correct horse").await.unwrap();

        let stored = store
            .get("ns/admin_sessions", &hash_token(&signed_in.token))
            .await
            .unwrap();
        assert!(stored.is_some());
        assert!(store.get("ns/admin_sessions", &signed_in.token).await.unwrap().is_none());

        let session = auth.authenticate(&signed_in.token).await.unwrap();
        assert_eq!(session.email, "admin@example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (_, _, auth) = auth_with(config());
        let err = auth.sign_in("admin@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn other_email_is_denied() {
        let (_, _, auth) = auth_with(config());
        let err = auth.sign_in("intruder@example.com", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied { .. }));
        let err = auth.request_link("intruder@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn unconfigured_password_is_reported() {
        let (_, _, auth) = auth_with(AuthConfig {
            password_hash: None,
            ..config()
        });
        let err = auth.sign_in("admin@example.com", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured { method: "password" }));
    }

    #[tokio::test]
    async fn sign_in_link_is_single_use() {
        let (_, sender, auth) = auth_with(config());
        auth.request_link("admin@example.com").await.unwrap();

        let (email, url) = sender.0.lock().unwrap().pop().unwrap();
        assert_eq!(email, "admin@example.com");
        let token = url.strip_prefix("https://example.com/admin/link/").unwrap();

        let signed_in = auth.consume_link(token).await.unwrap();
        assert!(auth.authenticate(&signed_in.token).await.is_ok());

        let err = auth.consume_link(token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn expired_link_is_rejected() {
        let (_, sender, auth) = auth_with(AuthConfig {
            link_ttl: Duration::zero(),
            ..config()
        });
        auth.request_link("admin@example.com").await.unwrap();
        let (_, url) = sender.0.lock().unwrap().pop().unwrap();
        let token = url.rsplit('/').next().unwrap().to_owned();

        let err = auth.consume_link(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { ref reason } if reason.contains("expired")));
    }

    #[tokio::test]
    async fn expired_session_is_removed() {
        let (store, _, auth) = auth_with(AuthConfig {
            session_ttl: Duration::zero(),
            ..config()
        });
        let signed_in = auth.sign_in("admin@example.com", "correct horse").await.unwrap();

        let err = auth.authenticate(&signed_in.token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sign_out_ends_session() {
        let (_, _, auth) = auth_with(config());
        let signed_in = auth.sign_in("admin@example.com", "correct horse").await.unwrap();
        auth.sign_out(&signed_in.token).await.unwrap();
        assert!(auth.authenticate(&signed_in.token).await.is_err());
    }

    #[tokio::test]
    async fn malformed_password_hash_disables_password_sign_in() {
        // A bare SHA-256 hex digest is not a PHC string.
        let digest = "4104d36f8da2c254349f85836793ebe029e0c957063a34c91c2e9203187b5631";
        assert!(check_password_hash(digest).is_err());
        assert!(check_password_hash(&phc("correct horse")).is_ok());

        let (_, _, auth) = auth_with(AuthConfig {
            password_hash: Some(digest.into()),
            ..config()
        });
        let err = auth.sign_in("admin@example.com", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured { method: "password" }));
    }

    #[tokio::test]
    async fn cost_parameters_come_from_the_hash() {
        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(64, 2, 2, None).unwrap(),
        );
        let salt = SaltString::encode_b64(b"a-different-salt").unwrap();
        let costlier = argon2
            .hash_password(b"correct horse", &salt)
            .unwrap()
            .to_string();
        let (_, _, auth) = auth_with(AuthConfig {
            password_hash: Some(costlier),
            ..config()
        });
        assert!(auth.sign_in("admin@example.com", "correct horse").await.is_ok());
    }
}
