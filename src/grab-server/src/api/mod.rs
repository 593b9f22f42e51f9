//! HTTP routes and handlers.
//!
//! Slack-facing routes (`/slack/events`, `/slack/interactions`) sit behind
//! request signature verification. The install pages and health check are
//! public.

mod events;
mod health;
mod install;
mod interactions;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::verify_slack_signature;
use crate::state::AppState;

pub use health::HealthResponse;

/// Create the API routes.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let slack = Router::new()
        .route("/slack/events", post(events::handle_event))
        .route("/slack/interactions", post(interactions::handle_interaction))
        .route_layer(middleware::from_fn_with_state(state, verify_slack_signature));

    Router::new()
        .merge(slack)
        .route("/install", get(install::install_page).post(install::begin_install))
        .route("/slack/oauth/callback", get(install::oauth_callback))
        .route("/health", get(health::health_check))
}
