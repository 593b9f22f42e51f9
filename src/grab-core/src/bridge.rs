//! Capability traits for the two platforms a publish run crosses.
//!
//! The orchestrator only ever talks to `ChatSource` and `WikiBridge`; the
//! concrete Slack and MediaWiki adapters are constructed per tenant from the
//! resolved `Instance` and passed in explicitly.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::correlation::{Correlation, ThreadReference};
use crate::error::BridgeResult;
use crate::thread::Thread;
use crate::transcript::{compile, stage_attachments};

/// Where the publish form is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSurface {
    /// A modal opened with a short-lived trigger.
    Modal {
        /// Trigger ID from the originating interaction.
        trigger_id: String,
    },
    /// An ephemeral message with confirm/cancel buttons, posted in the thread.
    Ephemeral,
}

/// Data carried by a publish form.
#[derive(Debug, Clone)]
pub struct PublishForm {
    /// Origin of the request; encoded into the form.
    pub correlation: Correlation,
    /// Whether to ask for an earlier message to start a range from.
    pub offer_range_start: bool,
}

impl PublishForm {
    /// Form for the given origin.
    pub fn new(correlation: Correlation) -> Self {
        Self {
            correlation,
            offer_range_start: false,
        }
    }

    /// Ask for an optional earlier message, turning a single-message request
    /// into a range. Only meaningful for thread references.
    pub fn with_range_start(mut self, offer: bool) -> Self {
        self.offer_range_start =
            offer && matches!(self.correlation.reference, ThreadReference::Thread { .. });
        self
    }
}

/// A message only the requesting user can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateNotice {
    /// Channel to post in.
    pub channel_id: String,
    /// User who sees the notice.
    pub user_id: String,
    /// Thread to post under, if any.
    pub thread_ts: Option<String>,
    /// Ephemeral reply URL; when present the original form is replaced.
    pub response_url: Option<String>,
    /// Notice text.
    pub text: String,
}

impl PrivateNotice {
    /// Notice addressed back to the origin of a request.
    pub fn reply_to(correlation: &Correlation, text: impl Into<String>) -> Self {
        Self {
            channel_id: correlation.channel_id.clone(),
            user_id: correlation.user_id.clone(),
            thread_ts: Some(correlation.reference.anchor_ts().to_string()),
            response_url: correlation.response_url.clone(),
            text: text.into(),
        }
    }
}

/// The chat platform side of a publish run.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// All replies anchored to `thread_ts`, oldest first.
    async fn fetch_by_thread_reference(&self, channel_id: &str, thread_ts: &str)
    -> BridgeResult<Thread>;

    /// All messages between `oldest` and `latest` inclusive, oldest first.
    async fn fetch_by_range(
        &self,
        channel_id: &str,
        oldest: &str,
        latest: &str,
    ) -> BridgeResult<Thread>;

    /// Fetch whichever shape of conversation the reference names.
    async fn fetch(&self, channel_id: &str, reference: &ThreadReference) -> BridgeResult<Thread> {
        match reference {
            ThreadReference::Thread { thread_ts } => {
                self.fetch_by_thread_reference(channel_id, thread_ts).await
            }
            ThreadReference::Range { oldest, latest } => {
                self.fetch_by_range(channel_id, oldest, latest).await
            }
        }
    }

    /// Show the publish form.
    async fn open_form(&self, surface: &FormSurface, form: &PublishForm) -> BridgeResult<()>;

    /// Post a message only the requesting user can see.
    async fn post_private_notice(&self, notice: &PrivateNotice) -> BridgeResult<()>;
}

/// Destination markup needed while compiling a transcript.
pub trait TranscriptSyntax: Send + Sync {
    /// Reference to an uploaded file, rendered inline.
    fn file_embed(&self, filename: &str) -> String;

    /// A named block of raw text, rendered verbatim.
    fn preformatted(&self, name: &str, contents: &str) -> String;
}

/// What a write to the destination actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    /// The article did not exist and was created.
    CreatedArticle,
    /// The body was appended to the end of an existing article.
    AppendedArticle,
    /// The whole article body was replaced.
    ReplacedArticle,
    /// A new section was added at the end of the article.
    CreatedSection,
    /// The body was appended into an existing section.
    AppendedSection,
    /// An existing section was emptied and recreated at the end.
    RecreatedSection,
}

/// Result of a successful article write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleReceipt {
    /// Canonical URL of the article after the write.
    pub url: String,
    /// Which write sequence was performed.
    pub action: WriteAction,
}

/// The wiki side of a publish run.
#[async_trait]
pub trait WikiBridge: TranscriptSyntax {
    /// Compile a thread into article text, uploading images on the way.
    async fn generate_transcript(&self, thread: &Thread) -> BridgeResult<String> {
        let staged = stage_attachments(thread, self).await?;
        Ok(compile(thread, &staged, self))
    }

    /// Reconcile `(title, section, body, clobber)` against the live article
    /// and perform one write sequence. An empty `section` means the whole
    /// article.
    async fn upload_article(
        &self,
        title: &str,
        section: &str,
        body: &str,
        clobber: bool,
    ) -> BridgeResult<ArticleReceipt>;

    /// Upload a local file and return its destination name. A duplicate of
    /// an existing file yields the existing name.
    async fn upload_image(&self, path: &Path) -> BridgeResult<String>;
}
