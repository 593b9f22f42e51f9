//! Grab Server - HTTP service that saves Slack threads to MediaWiki.
//!
//! This crate provides:
//! - The Slack Events API and interactivity endpoints
//! - The install page and OAuth callback that pair a workspace with a wiki
//! - Request signature verification
//! - A health check

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use grab_core::InstanceStore;
use grab_storage::{FileInstanceStore, instances_path};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if config.skip_signature_verification {
        warn!("Slack request signatures are NOT being verified!");
        warn!("Anyone who can reach this server can act as Slack.");
    }

    let store = match &config.data_dir {
        Some(dir) => FileInstanceStore::open(instances_path(dir)).await?,
        None => FileInstanceStore::open_default().await?,
    };
    info!(
        path = %store.path().display(),
        instances = store.len().await,
        "Instance store opened"
    );
    let store: Arc<dyn InstanceStore> = Arc::new(store);

    let state = Arc::new(AppState::new(config.clone(), store)?);
    state.start_cleanup_task();
    let app = create_router_with_state(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting Grab server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::routes(Arc::clone(&state)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
