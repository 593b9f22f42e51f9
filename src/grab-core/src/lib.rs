//! Core of Grab, the chat-to-wiki transcription bridge.
//!
//! This crate holds everything that does not depend on a particular chat
//! platform or wiki engine:
//! - The platform-neutral document model (`Thread`, `Message`, `Attachment`)
//! - The transcript compiler that turns a thread into article text
//! - The `ChatSource` and `WikiBridge` capability traits
//! - The publish orchestrator state machine
//! - The tenant (`Instance`) record and its store contract
//!
//! # Architecture
//!
//! ```text
//! interaction -> Orchestrator -> ChatSource::fetch -> WikiBridge::generate_transcript
//!                                                  -> WikiBridge::upload_article
//!                             -> ChatSource::post_private_notice
//! ```
//!
//! Adapters for Slack and MediaWiki live in `grab-slack` and `grab-mediawiki`.

pub mod bridge;
pub mod correlation;
pub mod error;
pub mod instance;
pub mod locks;
pub mod orchestrator;
pub mod thread;
pub mod transcript;

pub use bridge::{
    ArticleReceipt, ChatSource, FormSurface, PrivateNotice, PublishForm, TranscriptSyntax,
    WikiBridge, WriteAction,
};
pub use correlation::{Correlation, ThreadReference};
pub use error::{BridgeError, BridgeResult};
pub use instance::{Instance, InstanceStore, WikiCredentials};
pub use locks::{PublishGuard, PublishLocks};
pub use orchestrator::{CANCELLED_NOTICE, Orchestrator, PublishOutcome, PublishRequest, PublishState};
pub use thread::{Attachment, AttachmentKind, Message, Thread, TITLE_MAX_CHARS};
pub use transcript::{StagedAttachment, StagedAttachments, compile, stage_attachments};
