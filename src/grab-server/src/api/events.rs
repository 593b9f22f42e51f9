//! Events API endpoint.
//!
//! Slack expects a 200 within three seconds, so anything that calls back
//! into Slack runs in a spawned task after the acknowledgment.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grab_core::{
    BridgeError, BridgeResult, ChatSource, Correlation, FormSurface, Instance, Orchestrator,
    PrivateNotice, PublishForm, ThreadReference,
};
use grab_slack::events::{AppMentionEvent, EventCallback};
use grab_slack::{EventEnvelope, InnerEvent, NOT_IN_THREAD_NOTICE};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::state::AppState;

/// Handle one Events API delivery.
pub async fn handle_event(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let envelope: EventEnvelope = serde_json::from_slice(&body)?;

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("Answering URL verification challenge");
            return Ok(Json(json!({ "challenge": challenge })).into_response());
        }
        EventEnvelope::EventCallback(callback) => dispatch(state, callback).await?,
        EventEnvelope::AppRateLimited {
            minute_rate_limited,
        } => {
            warn!(?minute_rate_limited, "Slack is rate limiting events for this app");
        }
        EventEnvelope::Unknown => debug!("Ignoring unknown event envelope"),
    }

    Ok(StatusCode::OK.into_response())
}

async fn dispatch(state: Arc<AppState>, callback: EventCallback) -> AppResult<()> {
    let team_id = callback.team_id;
    match callback.event {
        InnerEvent::AppMention(mention) => {
            debug!(team = %team_id, event = ?callback.event_id, "App mention received");
            tokio::spawn(async move {
                if let Err(e) = handle_mention(&state, &team_id, &mention).await {
                    error!(team = %team_id, channel = %mention.channel, error = %e, "Could not answer mention");
                }
            });
        }
        event if event.ends_installation() => {
            let removed = state.store.remove_by_team(&team_id).await?;
            info!(team = %team_id, removed, "Installation ended");
        }
        _ => debug!(team = %team_id, "Ignoring event"),
    }
    Ok(())
}

async fn resolve_for_mention(
    state: &AppState,
    team_id: &str,
    mention: &AppMentionEvent,
) -> BridgeResult<Instance> {
    let user_team = mention.team.as_deref().unwrap_or(team_id);
    match state.store.resolve_by_user_team(user_team).await {
        Ok(instance) => Ok(instance),
        Err(_) => state.store.resolve_by_org_id(team_id).await,
    }
}

/// Offer the publish form in the mention's thread, or explain that
/// mentions only work inside threads.
async fn handle_mention(
    state: &AppState,
    team_id: &str,
    mention: &AppMentionEvent,
) -> BridgeResult<()> {
    let instance = resolve_for_mention(state, team_id, mention).await?;
    let chat = state
        .chat_for(&instance)
        .map_err(|e| BridgeError::Notify(e.to_string()))?;

    let Some(root) = mention.thread_root() else {
        info!(channel = %mention.channel, user = %mention.user, "Mention outside a thread");
        let notice = PrivateNotice {
            channel_id: mention.channel.clone(),
            user_id: mention.user.clone(),
            thread_ts: None,
            response_url: None,
            text: NOT_IN_THREAD_NOTICE.to_string(),
        };
        return chat.post_private_notice(&notice).await;
    };

    let correlation = Correlation {
        team_id: instance.slack_team_id.clone(),
        channel_id: mention.channel.clone(),
        user_id: mention.user.clone(),
        reference: ThreadReference::thread(root),
        response_url: None,
    };
    Orchestrator::new(&chat)
        .open_form(&FormSurface::Ephemeral, &PublishForm::new(correlation))
        .await?;
    Ok(())
}
