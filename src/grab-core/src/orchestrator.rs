//! Publish orchestrator.
//!
//! One `Orchestrator` handles one inbound interaction:
//!
//! ```text
//! Idle -> AwaitingFormInput -> AwaitingConfirmationOrSubmit -> Publishing -> Notified
//! ```
//!
//! It holds no cross-request state. The correlation needed to finish a
//! publish rides inside the form, and the chat and wiki adapters are
//! constructed per tenant by the caller.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::bridge::{
    ArticleReceipt, ChatSource, FormSurface, PrivateNotice, PublishForm, WikiBridge, WriteAction,
};
use crate::correlation::{Correlation, ThreadReference};
use crate::error::{BridgeError, BridgeResult};
use crate::locks::PublishLocks;

/// Text of the notice sent when the user cancels a form.
pub const CANCELLED_NOTICE: &str = "Grab request cancelled.";

/// Where one interaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Idle,
    AwaitingFormInput,
    AwaitingConfirmationOrSubmit,
    Publishing,
    Notified,
}

/// What the user asked to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub channel_id: String,
    pub reference: ThreadReference,
    /// Derived from the thread when absent.
    pub article_title: Option<String>,
    /// Whole-article mode when absent.
    pub section_title: Option<String>,
    pub clobber: bool,
}

impl PublishRequest {
    /// Request for a conversation with all optional fields unset.
    pub fn new(channel_id: impl Into<String>, reference: ThreadReference) -> Self {
        Self {
            channel_id: channel_id.into(),
            reference,
            article_title: None,
            section_title: None,
            clobber: false,
        }
    }

    /// Set the article title. Blank input counts as absent.
    pub fn with_article_title(mut self, title: Option<String>) -> Self {
        self.article_title = non_blank(title);
        self
    }

    /// Set the section title. Blank input counts as absent.
    pub fn with_section_title(mut self, section: Option<String>) -> Self {
        self.section_title = non_blank(section);
        self
    }

    /// Overwrite existing content instead of appending.
    pub fn with_clobber(mut self, clobber: bool) -> Self {
        self.clobber = clobber;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Terminal result of a submission, after the user was notified.
#[derive(Debug)]
pub enum PublishOutcome {
    Published(ArticleReceipt),
    Failed(BridgeError),
}

impl PublishOutcome {
    /// Whether the article was written.
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }
}

/// Drives one interaction through the publish state machine.
pub struct Orchestrator<'a> {
    chat: &'a dyn ChatSource,
    locks: Option<(&'a PublishLocks, String)>,
    state: PublishState,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator for one interaction against one tenant's chat workspace.
    pub fn new(chat: &'a dyn ChatSource) -> Self {
        Self {
            chat,
            locks: None,
            state: PublishState::Idle,
        }
    }

    /// Serialize writes per `(tenant, article, section)` through `locks`.
    pub fn with_locks(mut self, locks: &'a PublishLocks, tenant: impl Into<String>) -> Self {
        self.locks = Some((locks, tenant.into()));
        self
    }

    /// Current state.
    pub fn state(&self) -> PublishState {
        self.state
    }

    fn transition(&mut self, next: PublishState) {
        info!(from = ?self.state, to = ?next, "Publish state transition");
        self.state = next;
    }

    /// Show the publish form. A modal waits for its submission; an ephemeral
    /// form waits for confirm or cancel.
    pub async fn open_form(
        &mut self,
        surface: &FormSurface,
        form: &PublishForm,
    ) -> BridgeResult<PublishState> {
        self.chat.open_form(surface, form).await?;
        let next = match surface {
            FormSurface::Modal { .. } => PublishState::AwaitingFormInput,
            FormSurface::Ephemeral => PublishState::AwaitingConfirmationOrSubmit,
        };
        self.transition(next);
        Ok(next)
    }

    /// Fetch, compile and write one conversation.
    ///
    /// The fetched thread, and with it every downloaded attachment, is
    /// dropped before this returns on every path.
    pub async fn publish(
        &mut self,
        wiki: &dyn WikiBridge,
        request: &PublishRequest,
    ) -> BridgeResult<ArticleReceipt> {
        self.transition(PublishState::Publishing);

        let thread = self
            .chat
            .fetch(&request.channel_id, &request.reference)
            .await?;
        info!(
            channel = %request.channel_id,
            messages = thread.len(),
            "Thread fetched"
        );

        let title = request
            .article_title
            .clone()
            .unwrap_or_else(|| thread.title());
        let section = request.section_title.clone().unwrap_or_default();

        let body = wiki.generate_transcript(&thread).await?;
        drop(thread);

        let _guard = match &self.locks {
            Some((locks, tenant)) => Some(locks.acquire(tenant, &title, &section).await),
            None => None,
        };

        let receipt = wiki
            .upload_article(&title, &section, &body, request.clobber)
            .await?;
        info!(
            title = %title,
            section = %section,
            action = ?receipt.action,
            url = %receipt.url,
            "Article written"
        );
        Ok(receipt)
    }

    /// Publish a submitted form and tell the user how it went.
    pub async fn submit(
        &mut self,
        wiki: &dyn WikiBridge,
        request: &PublishRequest,
        correlation: &Correlation,
    ) -> PublishOutcome {
        match self.publish(wiki, request).await {
            Ok(receipt) => {
                let text = success_text(&receipt);
                self.notify(correlation, text).await;
                PublishOutcome::Published(receipt)
            }
            Err(err) => {
                self.fail(correlation, &err).await;
                PublishOutcome::Failed(err)
            }
        }
    }

    /// Report a failure privately and terminate.
    pub async fn fail(&mut self, correlation: &Correlation, err: &BridgeError) {
        error!(
            channel = %correlation.channel_id,
            user = %correlation.user_id,
            error = %err,
            "Publish failed"
        );
        self.notify(correlation, err.user_message()).await;
    }

    /// Acknowledge a cancelled form and terminate.
    pub async fn cancel(&mut self, correlation: &Correlation) {
        self.notify(correlation, CANCELLED_NOTICE.to_string()).await;
    }

    async fn notify(&mut self, correlation: &Correlation, text: String) {
        let notice = PrivateNotice::reply_to(correlation, text);
        if let Err(err) = self.chat.post_private_notice(&notice).await {
            warn!(
                channel = %notice.channel_id,
                user = %notice.user_id,
                error = %err,
                "Could not deliver private notice"
            );
        }
        self.transition(PublishState::Notified);
    }
}

fn success_text(receipt: &ArticleReceipt) -> String {
    let mut text = format!("Article saved! You can find it posted at: {}", receipt.url);
    if receipt.action == WriteAction::RecreatedSection {
        text.push_str(
            "\nThe existing section was overwritten and now sits at the end of the article.",
        );
    }
    text
}
