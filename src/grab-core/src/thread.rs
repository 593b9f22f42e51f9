//! Platform-neutral document model.
//!
//! A `Thread` is built fresh for every publish request and never persisted.
//! Attachments own the temporary file they were downloaded into; the file is
//! removed when the attachment (and therefore the thread) is dropped, which
//! covers success and failure paths alike.

use std::path::Path;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::error::{BridgeError, BridgeResult};

/// Maximum length, in characters, of a title derived from thread content.
pub const TITLE_MAX_CHARS: usize = 32;

/// A filtered, chronologically ordered conversation.
#[derive(Debug)]
pub struct Thread {
    timestamp: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Thread {
    /// Create a thread. Fails with `EmptyThread` when no messages survived
    /// filtering.
    pub fn new(timestamp: DateTime<Utc>, messages: Vec<Message>) -> BridgeResult<Self> {
        if messages.is_empty() {
            return Err(BridgeError::EmptyThread);
        }
        Ok(Self {
            timestamp,
            messages,
        })
    }

    /// Create a thread whose start time is taken from its first message.
    pub fn from_messages(messages: Vec<Message>) -> BridgeResult<Self> {
        let timestamp = messages
            .first()
            .map(|m| m.timestamp)
            .ok_or(BridgeError::EmptyThread)?;
        Self::new(timestamp, messages)
    }

    /// When the conversation began.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Default article title: the first line of the first message that has
    /// any text, cut to `TITLE_MAX_CHARS` characters. File-only threads get a
    /// title from the start time.
    pub fn title(&self) -> String {
        let line = self
            .messages
            .iter()
            .flat_map(|m| m.text.lines())
            .map(str::trim)
            .find(|line| !line.is_empty());

        match line {
            Some(line) => line
                .chars()
                .take(TITLE_MAX_CHARS)
                .collect::<String>()
                .trim_end()
                .to_string(),
            None => format!("Conversation {}", self.timestamp.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// One chat contribution.
#[derive(Debug)]
pub struct Message {
    /// When the message was posted.
    pub timestamp: DateTime<Utc>,
    /// Resolved display name of the author.
    pub author: String,
    /// Message body in neutral markup.
    pub text: String,
    /// Downloaded files pending upload, in posting order.
    pub files: Vec<Attachment>,
}

impl Message {
    /// Create a message without attachments.
    pub fn new(
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            author: author.into(),
            text: text.into(),
            files: Vec::new(),
        }
    }

    /// Attach a downloaded file.
    pub fn with_file(mut self, attachment: Attachment) -> Self {
        self.files.push(attachment);
        self
    }
}

/// How an attachment is rendered into a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Uploaded to the wiki and embedded.
    Image,
    /// Inlined as a preformatted block.
    Text,
    /// Neither; skipped.
    Unsupported,
}

impl AttachmentKind {
    /// Classify by MIME type.
    pub fn from_mimetype(mimetype: &str) -> Self {
        let mimetype = mimetype.to_ascii_lowercase();
        if mimetype.contains("image") {
            Self::Image
        } else if mimetype.contains("text") {
            Self::Text
        } else {
            Self::Unsupported
        }
    }
}

/// A file downloaded from the chat platform into a private temp file.
#[derive(Debug)]
pub struct Attachment {
    name: String,
    mimetype: String,
    file: NamedTempFile,
}

impl Attachment {
    /// Wrap a downloaded temp file.
    pub fn new(name: impl Into<String>, mimetype: impl Into<String>, file: NamedTempFile) -> Self {
        Self {
            name: name.into(),
            mimetype: mimetype.into(),
            file,
        }
    }

    /// Original file name on the chat platform.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type reported by the chat platform.
    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Rendering class of this attachment.
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_mimetype(&self.mimetype)
    }

    /// Local temp path. Valid for as long as the attachment lives.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
