//! Server configuration for `CertDesk`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `CERTDESK_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use certdesk_core::auth::{AuthConfig, DEFAULT_SESSION_TTL_HOURS};
use certdesk_core::certificate::{IssuerConfig, DEFAULT_ORGANIZATION};
use certdesk_core::code::DEFAULT_PREFIX;
use certdesk_core::repository::DEFAULT_STORE_TIMEOUT;

/// Default collection namespace.
pub const DEFAULT_NAMESPACE: &str = "artifacts/certdesk/public/data";

const DEFAULT_PORT: u16 = 8080;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Path prefix every collection lives under.
    pub namespace: String,
    /// Bound on each store call.
    pub store_timeout: Duration,
    /// Values stamped onto issued certificates.
    pub issuer: IssuerConfig,
    /// Admin sign-in settings.
    pub auth: AuthConfig,
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (binds to `0.0.0.0`)
    /// - `CERTDESK_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `CERTDESK_STORAGE`: `memory`, `rocksdb`, or `postgres` (default: `memory`)
    /// - `CERTDESK_STORAGE_PATH`: path for `RocksDB` (default: `./data`)
    /// - `DATABASE_URL`: PostgreSQL connection string (used when `CERTDESK_STORAGE=postgres`)
    /// - `CERTDESK_LOG_LEVEL`: log filter (default: `info`)
    /// - `CERTDESK_PUBLIC_ORIGIN`: origin used in verification and sign-in links
    /// - `CERTDESK_NAMESPACE`: collection namespace (default: `artifacts/certdesk/public/data`)
    /// - `CERTDESK_CODE_PREFIX`: certificate code prefix (default: `AWW`)
    /// - `CERTDESK_ORGANIZATION`: issuing organisation (default: `Atomicity Web Works`)
    /// - `CERTDESK_ADMIN_EMAIL`: the admin's email (admin sign-in disabled when unset)
    /// - `CERTDESK_ADMIN_PASSWORD_HASH`: Argon2 PHC string of the admin password
    /// - `CERTDESK_SESSION_TTL_HOURS`: admin session lifetime (default: `12`)
    /// - `CERTDESK_STORE_TIMEOUT_SECS`: bound on each store call (default: `10`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        // Priority: CERTDESK_BIND_ADDR > PORT > default 127.0.0.1:8080
        let bind_addr = if let Some(addr) = var("CERTDESK_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port) = var("PORT") {
            SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(DEFAULT_PORT)))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage_path = var("CERTDESK_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());
        let storage_backend = match var("CERTDESK_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            "postgres" | "postgresql" => StorageBackendType::Postgres {
                url: var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/certdesk".to_owned()),
            },
            _ => StorageBackendType::Memory,
        };

        let log_level = var("CERTDESK_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let public_origin = var("CERTDESK_PUBLIC_ORIGIN")
            .map(|o| o.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| format!("http://localhost:{}", bind_addr.port()));

        let store_timeout = var("CERTDESK_STORE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_STORE_TIMEOUT, Duration::from_secs);

        let session_ttl_hours = var("CERTDESK_SESSION_TTL_HOURS")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        let issuer = IssuerConfig {
            code_prefix: var("CERTDESK_CODE_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
            organization: var("CERTDESK_ORGANIZATION")
                .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_owned()),
            public_origin: public_origin.clone(),
        };

        let auth = AuthConfig {
            admin_email: var("CERTDESK_ADMIN_EMAIL").filter(|e| !e.trim().is_empty()),
            password_hash: var("CERTDESK_ADMIN_PASSWORD_HASH").filter(|h| !h.trim().is_empty()),
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            link_base: public_origin,
            ..AuthConfig::default()
        };

        Self {
            bind_addr,
            storage_backend,
            log_level,
            namespace: var("CERTDESK_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned()),
            store_timeout,
            issuer,
            auth,
        }
    }
}
