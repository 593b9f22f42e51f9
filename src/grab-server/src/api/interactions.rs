//! Interactivity endpoint: message shortcuts, form buttons and modal
//! submissions.
//!
//! Every payload is acknowledged immediately. Opening the modal, publishing
//! and the final private notice happen in a spawned task.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grab_core::{BridgeError, Correlation, FormSurface, Orchestrator, PublishForm};
use grab_slack::blocks::BLOCK_RANGE_START;
use grab_slack::interactions::{InteractionForm, MessageAction, SHORTCUT_CALLBACK_ID};
use grab_slack::{FormDecision, FormValues, InteractionPayload};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::state::AppState;

/// Handle one interaction payload.
pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> AppResult<Response> {
    match form.parse()? {
        InteractionPayload::MessageAction(action) => {
            if action.callback_id != SHORTCUT_CALLBACK_ID {
                debug!(callback = %action.callback_id, "Ignoring foreign shortcut");
                return Ok(StatusCode::OK.into_response());
            }
            tokio::spawn(open_modal(state, action));
        }
        InteractionPayload::BlockActions(actions) => match actions.decision()? {
            Some(FormDecision::Confirm(correlation)) => {
                tokio::spawn(publish(state, correlation, actions.values()));
            }
            Some(FormDecision::Cancel(correlation)) => {
                tokio::spawn(cancel(state, correlation));
            }
            None => debug!("Ignoring unrelated block action"),
        },
        InteractionPayload::ViewSubmission(submission) => {
            if submission.view.callback_id != SHORTCUT_CALLBACK_ID {
                return Ok(StatusCode::OK.into_response());
            }
            let correlation = submission.correlation()?;
            let values = submission.values();

            // A bad link is reported inside the still-open modal.
            if let Err(e) = values.clone().into_request(&correlation) {
                info!(user = %correlation.user_id, error = %e, "Rejected start message link");
                let errors = modal_errors(BLOCK_RANGE_START, "That is not a Slack message link.");
                return Ok(Json(errors).into_response());
            }
            tokio::spawn(publish(state, correlation, values));
        }
        InteractionPayload::Unknown => debug!("Ignoring unknown interaction type"),
    }

    Ok(StatusCode::OK.into_response())
}

fn modal_errors(block_id: &str, message: &str) -> serde_json::Value {
    let errors: HashMap<&str, &str> = HashMap::from([(block_id, message)]);
    json!({ "response_action": "errors", "errors": errors })
}

async fn open_modal(state: Arc<AppState>, action: MessageAction) {
    let correlation = action.correlation();
    let instance = match state.store.resolve_by_org_id(&correlation.team_id).await {
        Ok(instance) => instance,
        Err(e) => {
            error!(team = %correlation.team_id, error = %e, "Shortcut from unknown workspace");
            return;
        }
    };
    let chat = match state.chat_for(&instance) {
        Ok(chat) => chat,
        Err(e) => {
            error!(team = %correlation.team_id, error = %e, "Could not build Slack client");
            return;
        }
    };

    let (_, offer_range) = action.reference();
    let form = PublishForm::new(correlation.clone()).with_range_start(offer_range);
    let surface = FormSurface::Modal {
        trigger_id: action.trigger_id.clone(),
    };

    let mut orchestrator = Orchestrator::new(&chat);
    if let Err(e) = orchestrator.open_form(&surface, &form).await {
        orchestrator.fail(&correlation, &e).await;
    }
}

/// Run a submitted form through fetch, compile and write, then notify.
async fn publish(state: Arc<AppState>, correlation: Correlation, values: FormValues) {
    let instance = match state.store.resolve_by_org_id(&correlation.team_id).await {
        Ok(instance) => instance,
        Err(e) => {
            error!(team = %correlation.team_id, error = %e, "Submission from unknown workspace");
            return;
        }
    };
    let chat = match state.chat_for(&instance) {
        Ok(chat) => chat,
        Err(e) => {
            error!(team = %correlation.team_id, error = %e, "Could not build Slack client");
            return;
        }
    };

    let mut orchestrator =
        Orchestrator::new(&chat).with_locks(&state.locks, instance.slack_team_id.clone());

    let request = match values.into_request(&correlation) {
        Ok(request) => request,
        Err(e) => {
            orchestrator
                .fail(&correlation, &BridgeError::InvalidCorrelation(e.to_string()))
                .await;
            return;
        }
    };
    let wiki = match state.wiki_for(&instance) {
        Ok(wiki) => wiki,
        Err(e) => {
            warn!(team = %instance.slack_team_id, error = %e, "Wiki is misconfigured");
            orchestrator
                .fail(&correlation, &BridgeError::DestinationAuth(e.to_string()))
                .await;
            return;
        }
    };

    let outcome = orchestrator.submit(&wiki, &request, &correlation).await;
    info!(
        team = %instance.slack_team_id,
        channel = %correlation.channel_id,
        published = outcome.is_published(),
        "Publish finished"
    );
}

async fn cancel(state: Arc<AppState>, correlation: Correlation) {
    let chat = match state.store.resolve_by_org_id(&correlation.team_id).await {
        Ok(instance) => state.chat_for(&instance),
        Err(e) => {
            error!(team = %correlation.team_id, error = %e, "Cancel from unknown workspace");
            return;
        }
    };
    match chat {
        Ok(chat) => Orchestrator::new(&chat).cancel(&correlation).await,
        Err(e) => error!(team = %correlation.team_id, error = %e, "Could not build Slack client"),
    }
}
