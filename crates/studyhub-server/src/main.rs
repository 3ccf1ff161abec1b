//! # studyhub-server
//!
//! HTTP API for StudyHub, a multi-user flashcard and topic manager.
//!
//! This binary provides:
//! - **Accounts and bearer tokens** (register, login, logout, profile)
//! - **Topic and card CRUD** scoped to the authenticated owner
//! - **Peer relationships** (search, request, accept/reject, remove)
//! - **Read-only topic sharing** between accepted peers, with an audit log
//!   of every shared read
//! - **Per-IP rate limiting** on the credential endpoints

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use studyhub_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,studyhub_server=debug")),
        )
        .init();

    info!("Starting StudyHub server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database (runs pending migrations)
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, forget clients idle >10 min)
    let limiter = app_state.auth_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = limiter.purge_idle(600.0).await;
            if purged > 0 {
                tracing::debug!(purged, "idle rate limit buckets removed");
            }
        }
    });

    // Expired session cleanup (hourly)
    let db = Arc::clone(&app_state.db);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let result = match db.lock() {
                Ok(db) => db.purge_expired_sessions(chrono::Utc::now()),
                Err(_) => break,
            };
            match result {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "expired sessions removed"),
                Err(e) => tracing::warn!(error = %e, "session cleanup failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
