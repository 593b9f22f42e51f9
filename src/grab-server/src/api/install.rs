//! Installation flow.
//!
//! 1. `GET /install` asks for the wiki account transcripts are written as.
//! 2. `POST /install` parks those credentials under a random OAuth `state`
//!    and redirects to Slack's consent page.
//! 3. `GET /slack/oauth/callback` exchanges the code, pairs the bot token
//!    with the parked credentials and stores the instance.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use grab_core::{Instance, WikiCredentials};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INSTALL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Install Grab</title></head>
<body>
<h1>Install Grab</h1>
<p>Grab saves Slack threads to your wiki. Enter the account it should edit as,
or leave the fields empty to use the server's default wiki account.</p>
<form method="post" action="/install">
<p><label>Wiki URL <input name="wiki_url" type="url" placeholder="https://wiki.example.org/w"></label></p>
<p><label>Username <input name="wiki_username"></label></p>
<p><label>Password <input name="wiki_password" type="password"></label></p>
<p><label>Domain (optional) <input name="wiki_domain"></label></p>
<p><button type="submit">Add to Slack</button></p>
</form>
</body>
</html>"#;

/// Fields posted by the install page.
#[derive(Debug, Default, Deserialize)]
pub struct InstallForm {
    #[serde(default)]
    pub wiki_url: String,
    #[serde(default)]
    pub wiki_username: String,
    #[serde(default)]
    pub wiki_password: String,
    #[serde(default)]
    pub wiki_domain: String,
}

impl InstallForm {
    /// Entered credentials, or the server default when the URL is blank.
    fn into_credentials(self, default: Option<&WikiCredentials>) -> AppResult<WikiCredentials> {
        let url = self.wiki_url.trim();
        if url.is_empty() {
            return default.cloned().ok_or_else(|| {
                AppError::BadRequest("a wiki URL is required".to_string())
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::BadRequest(format!(
                "wiki URL must start with http:// or https://: {url}"
            )));
        }
        if self.wiki_username.trim().is_empty() || self.wiki_password.is_empty() {
            return Err(AppError::BadRequest(
                "wiki username and password are required".to_string(),
            ));
        }

        Ok(
            WikiCredentials::new(url, self.wiki_username.trim(), self.wiki_password)
                .with_domain(Some(self.wiki_domain)),
        )
    }
}

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

fn result_page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Grab - {title}</title></head>
<body>
<h1>{title}</h1>
<p>{message}</p>
</body>
</html>"#
    ))
}

/// Serve the install form.
pub async fn install_page(State(state): State<Arc<AppState>>) -> AppResult<Html<&'static str>> {
    state.oauth()?;
    Ok(Html(INSTALL_PAGE))
}

/// Park the wiki credentials and send the installer to Slack.
pub async fn begin_install(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InstallForm>,
) -> AppResult<Redirect> {
    let oauth = state.oauth()?;
    let wiki = form.into_credentials(state.config.default_wiki.as_ref())?;
    info!(wiki = %wiki.url, user = %wiki.username, "Starting installation");

    let token = state.park_install(wiki);
    Ok(Redirect::to(&oauth.authorize_url(&token)))
}

/// Finish the installation after Slack redirects back.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthCallbackParams>,
) -> AppResult<Response> {
    if let Some(error) = params.error {
        error!("OAuth error from Slack: {}", error);
        return Ok(result_page("Installation Failed", &format!("Slack reported: {error}"))
            .into_response());
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;
    let token = params
        .state
        .ok_or_else(|| AppError::BadRequest("missing state parameter".to_string()))?;
    let wiki = state.take_install(&token).ok_or_else(|| {
        AppError::Gone("installation request expired, please start again".to_string())
    })?;

    let installation = state.oauth()?.exchange_code(&code).await?;

    let mut instance = Instance::new(&installation.team_id, installation.access_token, wiki);
    instance.slack_enterprise_id = installation.enterprise_id;
    instance.slack_bot_user_id = installation.bot_user_id;
    let wiki_url = instance.wiki.url.clone();
    state.store.upsert(instance).await?;

    let team = installation
        .team_name
        .unwrap_or_else(|| installation.team_id.clone());
    info!(team = %installation.team_id, wiki = %wiki_url, "Installation complete");
    Ok(result_page(
        "Installed",
        &format!("Grab is now installed in {team} and will publish to {wiki_url}."),
    )
    .into_response())
}
