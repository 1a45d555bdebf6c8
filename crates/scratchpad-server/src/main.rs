//! Shared scratchpad lock service.
//!
//! This server:
//! - Authenticates callers by bearer token against a users file
//! - Answers heartbeat polls with per-resource lock verdicts
//! - Accepts nonce-protected, lock-gated saves

use std::sync::Arc;

use clap::Parser;
use scratchpad_core::{
    Clock, ContentStore, LockManager, LockStore, MemoryContentStore, MemoryLockStore,
    SaveService, SystemClock,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scratchpad_server::auth::{hash_token, UserDirectory};
use scratchpad_server::build_router;
use scratchpad_server::config::{Command, Config, StorageBackend};
use scratchpad_server::nonce::NonceIssuer;
use scratchpad_server::state::AppState;
use scratchpad_server::storage::FileContentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    if let Some(Command::HashToken { token }) = &config.command {
        println!("{}", hash_token(token));
        return Ok(());
    }

    info!("Starting scratchpad-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Backend: {}", config.storage_backend);
    info!(
        "  Resources: {}",
        config
            .resources
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("  Lock TTL: {}s", config.lock_ttl_secs);

    if config.resources.is_empty() {
        anyhow::bail!("At least one resource must be configured");
    }

    let users_file = config.effective_users_file();
    let directory = Arc::new(UserDirectory::load(&users_file).await?);
    info!("  Users: {} (from {})", directory.len(), users_file.display());
    if directory.is_empty() {
        warn!("  Users file is empty, every request will be rejected");
    }

    let content: Arc<dyn ContentStore> = match config.storage_backend {
        StorageBackend::File => {
            let dir = config.effective_data_dir();
            info!("  Data dir: {}", dir.display());
            Arc::new(FileContentStore::new(&dir))
        }
        StorageBackend::Memory => {
            warn!("  Content is kept in memory and lost on shutdown");
            Arc::new(MemoryContentStore::new())
        }
    };
    let locks: Arc<dyn LockStore> = Arc::new(MemoryLockStore::new());
    info!(
        "  Stores: locks={}, content={}",
        locks.backend_name(),
        content.backend_name()
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let nonce_secret = config.nonce_secret.clone().unwrap_or_else(|| {
        warn!("  No nonce secret configured, using a random one");
        uuid::Uuid::new_v4().to_string()
    });

    let manager = LockManager::new(
        locks.clone(),
        content.clone(),
        clock.clone(),
        directory.clone(),
        config.lock_ttl(),
    );
    let saver = SaveService::new(locks, content, clock.clone(), config.lock_ttl())
        .with_max_content_bytes(config.max_content_bytes);

    let state = AppState {
        directory,
        nonces: Arc::new(NonceIssuer::new(nonce_secret, config.nonce_lifetime(), clock)),
        manager: Arc::new(manager),
        saver: Arc::new(saver),
        resources: Arc::new(config.resources.clone()),
    };

    let app = build_router(state);

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating shutdown");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
