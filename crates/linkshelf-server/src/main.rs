//! Linkshelf Server
//!
//! REST backend for a personal bookmark manager: categories, sections,
//! bookmarks with visit tracking, achievements, and an iframe proxy.

mod config;
mod error;
mod extractors;
mod handlers;
mod routes;
mod storage;

use anyhow::{Context, Result};
use linkshelf_core::ports::Storage;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub config: Arc<ServerConfig>,
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Linkshelf Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    info!("Loading configuration...");
    let config = ServerConfig::load()
        .context("Failed to load configuration (is DATABASE_URL set?)")?;
    info!(
        "Config loaded: bind={}, demo_user={}, proxy_allow_list={:?}",
        config.bind_address, config.demo_user_id, config.proxy_allowed_hosts
    );

    info!("Initializing storage...");
    let store = storage::connect(&config)
        .await
        .context("Failed to initialize storage")?;
    info!("Storage initialized");

    let http = handlers::proxy::build_client(&config).context("Failed to build proxy client")?;

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;

    let state = AppState {
        store,
        config: Arc::new(config),
        http,
    };

    info!("Building HTTP router...");
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
