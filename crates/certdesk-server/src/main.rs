//! `CertDesk` server entry point.
//!
//! Bootstraps the document store selected by configuration, builds the
//! shared state, then starts the Axum HTTP server with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use certdesk_core::auth::check_password_hash;
use certdesk_server::config::{ServerConfig, StorageBackendType};
use certdesk_server::state::AppState;
use certdesk_storage::{DocumentStore, MemoryStore};

/// How long open connections may delay shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        storage = ?config.storage_backend,
        namespace = %config.namespace,
        public_origin = %config.issuer.public_origin,
        "CertDesk starting"
    );
    if config.auth.admin_email.is_none() {
        warn!("CERTDESK_ADMIN_EMAIL is not set; admin sign-in is disabled");
    }
    if config
        .auth
        .password_hash
        .as_deref()
        .is_some_and(|phc| check_password_hash(phc).is_err())
    {
        warn!("CERTDESK_ADMIN_PASSWORD_HASH is not an Argon2 PHC string; password sign-in is disabled");
    }

    let store = open_store(&config.storage_backend).await?;
    let state = Arc::new(AppState::new(store, &config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = certdesk_server::app(state);

    // Bind and serve.
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "CertDesk server listening");

    tokio::spawn(shutdown_signal(shutdown_tx));

    // Live listing sockets never close on their own, so open connections
    // get a bounded grace period once shutdown starts.
    let mut graceful_rx = shutdown_rx.clone();
    let server = std::future::IntoFuture::into_future(
        axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = graceful_rx.changed().await;
        }),
    );
    let mut deadline_rx = shutdown_rx;
    let deadline = async move {
        let _ = deadline_rx.changed().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = server => result.context("server error")?,
        () = deadline => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "connections still open after grace period, exiting"
        ),
    }

    info!("CertDesk server stopped");
    Ok(())
}

/// Open the configured document store.
async fn open_store(backend: &StorageBackendType) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Arc::new(MemoryStore::new())
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackendType::RocksDb { path } => {
            info!(path = %path, "using RocksDB storage");
            Arc::new(
                certdesk_storage::RocksDbStore::open(path)
                    .context("failed to open RocksDB storage")?,
            )
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackendType::RocksDb { .. } => {
            anyhow::bail!("RocksDB backend requested but feature 'rocksdb-backend' is not enabled");
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL storage");
            Arc::new(
                certdesk_storage::PostgresStore::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL storage")?,
            )
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageBackendType::Postgres { .. } => {
            anyhow::bail!(
                "PostgreSQL backend requested but feature 'postgres-backend' is not enabled"
            );
        }
    };
    Ok(store)
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
