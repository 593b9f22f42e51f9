//! Transcript compiler.
//!
//! Compilation happens in two steps:
//! 1. `stage_attachments` performs the only side effects: image uploads via
//!    the wiki bridge and reads of text attachments from their temp files.
//! 2. `compile` is a pure function of the thread, the staged attachments and
//!    the destination syntax. Same inputs, byte-identical output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bridge::{TranscriptSyntax, WikiBridge};
use crate::error::BridgeResult;
use crate::thread::{AttachmentKind, Thread};

/// Layout of the header timestamp.
const HEADER_TIME_FORMAT: &str = "%Y-%m-%d at %H:%M";

/// How a single attachment ends up in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedAttachment {
    /// Uploaded; embed by destination file name.
    Embed(String),
    /// Inline these contents verbatim.
    Inline(String),
}

/// Attachments prepared for compilation, keyed by local temp path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedAttachments {
    entries: HashMap<PathBuf, StagedAttachment>,
}

impl StagedAttachments {
    /// Empty set, for threads without files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an uploaded image.
    pub fn insert_embed(&mut self, path: impl Into<PathBuf>, filename: impl Into<String>) {
        self.entries
            .insert(path.into(), StagedAttachment::Embed(filename.into()));
    }

    /// Record inline text contents.
    pub fn insert_inline(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.entries
            .insert(path.into(), StagedAttachment::Inline(contents.into()));
    }

    /// Look up a staged attachment.
    pub fn get(&self, path: &Path) -> Option<&StagedAttachment> {
        self.entries.get(path)
    }

    /// Number of staged attachments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Upload image attachments and read text attachments.
///
/// Unsupported attachment types are skipped with a warning.
pub async fn stage_attachments<W>(thread: &Thread, wiki: &W) -> BridgeResult<StagedAttachments>
where
    W: WikiBridge + ?Sized,
{
    let mut staged = StagedAttachments::new();

    for message in thread.messages() {
        for attachment in &message.files {
            match attachment.kind() {
                AttachmentKind::Image => {
                    let filename = wiki.upload_image(attachment.path()).await?;
                    debug!(name = %attachment.name(), %filename, "Staged image attachment");
                    staged.insert_embed(attachment.path(), filename);
                }
                AttachmentKind::Text => {
                    let bytes = tokio::fs::read(attachment.path()).await?;
                    let contents = String::from_utf8_lossy(&bytes).into_owned();
                    staged.insert_inline(attachment.path(), contents);
                }
                AttachmentKind::Unsupported => {
                    warn!(
                        name = %attachment.name(),
                        mimetype = %attachment.mimetype(),
                        "Skipping unsupported attachment"
                    );
                }
            }
        }
    }

    Ok(staged)
}

/// Render a thread as article text.
pub fn compile<S>(thread: &Thread, staged: &StagedAttachments, syntax: &S) -> String
where
    S: TranscriptSyntax + ?Sized,
{
    let mut transcript = format!(
        "Conversation begins at {}\n\n",
        thread.timestamp().format(HEADER_TIME_FORMAT)
    );

    for message in thread.messages() {
        transcript.push_str(&message.author);
        transcript.push_str(": ");
        transcript.push_str(&message.text);
        transcript.push_str("\n\n");

        for attachment in &message.files {
            match staged.get(attachment.path()) {
                Some(StagedAttachment::Embed(filename)) => {
                    transcript.push_str(&syntax.file_embed(filename));
                    transcript.push_str("\n\n");
                }
                Some(StagedAttachment::Inline(contents)) => {
                    transcript.push_str(&syntax.preformatted(attachment.name(), contents));
                    transcript.push_str("\n\n");
                }
                None => {}
            }
        }
    }

    transcript
}
