//! # catalog-server
//!
//! HTTP backend for the course catalog.
//!
//! This binary provides:
//! - **Accounts**: registration, login with bearer tokens, role-gated admin routes
//! - **Catalog CRUD** for courses, sections, course media, subsections and
//!   subsection resources
//! - **Uploads** stored on local disk and served back under `/uploads`

mod api;
mod auth;
mod catalog;
mod config;
mod error;
mod form;
mod media;
mod uploads;

use std::sync::Arc;

use catalog_shared::constants::APP_NAME;
use catalog_shared::token::TokenSigner;
use catalog_store::Database;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::uploads::UploadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine, the process environment still applies.
    dotenvy::dotenv().ok();

    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,catalog_server=debug,catalog_store=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database ready");

    let uploads = UploadStore::new(config.upload_dir.clone(), config.max_upload_size).await?;
    let tokens = TokenSigner::new(config.jwt_secret.as_bytes());

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        uploads: Arc::new(uploads),
        tokens: Arc::new(tokens),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
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
