//! HTTP middleware components.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use grab_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Authentication(format!("missing {name} header")))
}

/// Reject requests that were not signed with the app's signing secret.
///
/// The body is buffered to compute the signature and handed on unchanged.
pub async fn verify_slack_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if state.config.skip_signature_verification {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, state.config.max_body_size)
        .await
        .map_err(|_| AppError::PayloadTooLarge)?;

    let timestamp = header(&parts.headers, TIMESTAMP_HEADER)?;
    let signature = header(&parts.headers, SIGNATURE_HEADER)?;
    if let Err(e) = state.verifier().verify(timestamp, &bytes, signature) {
        warn!(uri = %parts.uri, error = %e, "Rejected unsigned Slack request");
        return Err(e.into());
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
