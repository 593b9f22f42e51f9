//! MediaWiki Action API client.
//!
//! A `MediaWikiClient` holds one cookie session for one tenant's bot
//! account. It logs in lazily on first use and keeps the CSRF token for the
//! lifetime of the client, which is one publish run.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use grab_core::WikiCredentials;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{WikiError, WikiResult};

/// Edit summary attached to every write.
pub const EDIT_SUMMARY: &str = "Grab transcript";
/// Upload comment attached to every file.
pub const UPLOAD_COMMENT: &str = "Attachment from Slack.";

/// Existence and address of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleInfo {
    pub exists: bool,
    pub canonical_url: String,
}

/// Which part of an article an edit touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    /// The whole page.
    Article,
    /// An existing section, by its index from `parse`.
    Section(String),
    /// A new section appended to the end of the page.
    NewSection(String),
}

/// Whether an edit replaces or appends to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Replace,
    Append,
}

/// One `action=edit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub title: String,
    pub target: EditTarget,
    pub mode: EditMode,
    pub text: String,
}

/// Result of a file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name of the file on the wiki.
    pub name: String,
    /// The content already existed under `name`; nothing new was stored.
    pub was_duplicate: bool,
}

/// Wiki operations the bridge relies on.
#[async_trait]
pub trait WikiApi: Send + Sync {
    /// Whether `title` exists, and its canonical URL either way.
    async fn query_article(&self, title: &str) -> WikiResult<ArticleInfo>;

    /// Index of the first section titled exactly `section`, if any.
    async fn query_section(&self, title: &str, section: &str) -> WikiResult<Option<String>>;

    /// Perform one edit.
    async fn edit_article(&self, edit: &Edit) -> WikiResult<()>;

    /// Upload a local file under its own base name.
    async fn upload_file(&self, path: &Path) -> WikiResult<UploadedFile>;
}

/// Turn a configured wiki URL into its `api.php` endpoint.
pub fn api_endpoint(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.ends_with(".php") {
        url.to_string()
    } else {
        format!("{url}/api.php")
    }
}

/// Action API client for one bot account.
pub struct MediaWikiClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: WikiCredentials,
    csrf_token: OnceCell<String>,
}

impl std::fmt::Debug for MediaWikiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWikiClient")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("logged_in", &self.csrf_token.initialized())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    result: String,
    #[serde(default)]
    reason: Option<String>,
}

impl MediaWikiClient {
    /// Create a client for one tenant's wiki account.
    pub fn new(credentials: WikiCredentials) -> WikiResult<Self> {
        if credentials.url.trim().is_empty() {
            return Err(WikiError::Config("wiki URL is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("grab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WikiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: api_endpoint(&credentials.url),
            credentials,
            csrf_token: OnceCell::new(),
        })
    }

    /// The `api.php` endpoint in use.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Log in and fetch a CSRF token, once per client.
    async fn session(&self) -> WikiResult<&str> {
        let token = self
            .csrf_token
            .get_or_try_init(|| async {
                self.login().await?;
                self.token("csrf").await
            })
            .await?;
        Ok(token.as_str())
    }

    async fn token(&self, kind: &str) -> WikiResult<String> {
        let json = self
            .get(&[("action", "query"), ("meta", "tokens"), ("type", kind)])
            .await?;
        json.pointer(&format!("/query/tokens/{kind}token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WikiError::UnexpectedResponse(format!("no {kind} token in response")))
    }

    async fn login(&self) -> WikiResult<()> {
        let login_token = self.token("login").await?;

        let mut form = vec![
            ("action", "login"),
            ("lgname", self.credentials.username.as_str()),
            ("lgpassword", self.credentials.password.expose_secret()),
            ("lgtoken", login_token.as_str()),
        ];
        if let Some(domain) = &self.credentials.domain {
            form.push(("lgdomain", domain.as_str()));
        }

        let json = self.post_form(&form).await?;
        let result: LoginResult = serde_json::from_value(
            json.get("login")
                .cloned()
                .ok_or_else(|| WikiError::UnexpectedResponse("no login result".to_string()))?,
        )?;

        if result.result != "Success" {
            let reason = result.reason.unwrap_or(result.result);
            warn!(user = %self.credentials.username, "Wiki login rejected");
            return Err(WikiError::Auth(reason));
        }
        info!(user = %self.credentials.username, endpoint = %self.endpoint, "Logged into wiki");
        Ok(())
    }

    async fn get(&self, params: &[(&str, &str)]) -> WikiResult<Value> {
        debug!(?params, "MediaWiki GET");
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> WikiResult<Value> {
        let action = params
            .iter()
            .find(|(key, _)| *key == "action")
            .map(|(_, value)| *value)
            .unwrap_or_default();
        debug!(action, "MediaWiki POST");

        let mut form: Vec<(&str, &str)> = vec![("format", "json"), ("formatversion", "2")];
        form.extend_from_slice(params);
        let response = self.http.post(&self.endpoint).form(&form).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> WikiResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WikiError::Network(format!("HTTP {}: {}", status, body)));
        }

        let json: Value = response.json().await?;
        if let Some(error) = json.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = error.get("info").and_then(Value::as_str).unwrap_or_default();
            return Err(WikiError::api(code, info));
        }
        Ok(json)
    }
}

#[async_trait]
impl WikiApi for MediaWikiClient {
    async fn query_article(&self, title: &str) -> WikiResult<ArticleInfo> {
        self.session().await?;
        let json = self
            .get(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "info"),
                ("inprop", "url"),
            ])
            .await?;

        let page = json
            .pointer("/query/pages/0")
            .ok_or_else(|| WikiError::UnexpectedResponse(format!("no page for {title}")))?;
        let canonical_url = page
            .get("canonicalurl")
            .and_then(Value::as_str)
            .ok_or_else(|| WikiError::UnexpectedResponse(format!("no URL for {title}")))?
            .to_string();
        let missing = page
            .get("missing")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(ArticleInfo {
            exists: !missing,
            canonical_url,
        })
    }

    async fn query_section(&self, title: &str, section: &str) -> WikiResult<Option<String>> {
        self.session().await?;
        let json = match self
            .get(&[("action", "parse"), ("page", title), ("prop", "sections")])
            .await
        {
            Ok(json) => json,
            Err(WikiError::Api { code, .. }) if code == "missingtitle" => return Ok(None),
            Err(e) => return Err(e),
        };

        let sections = json
            .pointer("/parse/sections")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        // Exact, case-sensitive title match; first hit wins.
        let index = sections.iter().find_map(|s| {
            let line = s.get("line").and_then(Value::as_str)?;
            if line != section {
                return None;
            }
            match s.get("index") {
                Some(Value::String(index)) => Some(index.clone()),
                Some(Value::Number(index)) => Some(index.to_string()),
                _ => None,
            }
        });
        Ok(index)
    }

    async fn edit_article(&self, edit: &Edit) -> WikiResult<()> {
        let token = self.session().await?;

        let mut form: Vec<(&str, &str)> = vec![
            ("action", "edit"),
            ("title", edit.title.as_str()),
            ("bot", "true"),
            ("summary", EDIT_SUMMARY),
        ];
        match &edit.target {
            EditTarget::Article => {}
            EditTarget::Section(index) => form.push(("section", index.as_str())),
            EditTarget::NewSection(title) => {
                form.push(("section", "new"));
                form.push(("sectiontitle", title.as_str()));
            }
        }
        match edit.mode {
            EditMode::Replace => form.push(("text", edit.text.as_str())),
            EditMode::Append => form.push(("appendtext", edit.text.as_str())),
        }
        form.push(("token", token));

        let json = self.post_form(&form).await?;
        match json.pointer("/edit/result").and_then(Value::as_str) {
            Some("Success") => {
                debug!(title = %edit.title, target = ?edit.target, mode = ?edit.mode, "Edit saved");
                Ok(())
            }
            other => Err(WikiError::UnexpectedResponse(format!(
                "edit of {} returned {:?}",
                edit.title, other
            ))),
        }
    }

    async fn upload_file(&self, path: &Path) -> WikiResult<UploadedFile> {
        let token = self.session().await?.to_string();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| WikiError::File(format!("no file name in {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len();

        let form = Form::new()
            .text("action", "upload")
            .text("format", "json")
            .text("formatversion", "2")
            .text("filename", filename.clone())
            .text("comment", UPLOAD_COMMENT)
            .text("token", token)
            .part("file", Part::bytes(bytes).file_name(filename.clone()));

        debug!(file = %filename, size, "MediaWiki upload");
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let json = Self::decode(response).await?;
        parse_upload(&json)
    }
}

/// Interpret an `action=upload` response.
fn parse_upload(json: &Value) -> WikiResult<UploadedFile> {
    let upload = json
        .get("upload")
        .ok_or_else(|| WikiError::UnexpectedResponse("no upload result".to_string()))?;

    match upload.get("result").and_then(Value::as_str) {
        Some("Success") => {
            let name = upload
                .get("filename")
                .and_then(Value::as_str)
                .ok_or_else(|| WikiError::UnexpectedResponse("upload has no filename".to_string()))?;
            Ok(UploadedFile {
                name: name.to_string(),
                was_duplicate: false,
            })
        }
        Some("Warning") => {
            let warnings = upload.get("warnings").cloned().unwrap_or(Value::Null);
            let duplicate = match warnings.get("duplicate") {
                Some(Value::Array(names)) => names.first().and_then(Value::as_str),
                Some(Value::String(name)) => Some(name.as_str()),
                _ => None,
            };
            match duplicate {
                Some(name) => Ok(UploadedFile {
                    name: name.to_string(),
                    was_duplicate: true,
                }),
                None => Err(WikiError::Api {
                    code: "uploadwarning".to_string(),
                    info: warnings.to_string(),
                }),
            }
        }
        other => Err(WikiError::UnexpectedResponse(format!(
            "upload returned {:?}",
            other
        ))),
    }
}
