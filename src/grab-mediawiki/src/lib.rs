//! MediaWiki side of Grab.
//!
//! - `MediaWikiClient`: one logged-in Action API session (cookie jar, CSRF
//!   token) for a tenant's bot account
//! - `WikiApi`: the handful of wiki calls the bridge needs, so the write
//!   reconciliation can be tested without a wiki
//! - `MediaWikiBridge`: the `WikiBridge` used by the publish orchestrator
//!
//! Transcripts are written as-is; MediaWiki renders the neutral markup
//! literally apart from file embeds and `<pre>` blocks.

pub mod bridge;
pub mod client;
pub mod error;

pub use bridge::MediaWikiBridge;
pub use client::{
    ArticleInfo, Edit, EditMode, EditTarget, MediaWikiClient, UploadedFile, WikiApi, api_endpoint,
};
pub use error::{WikiError, WikiResult};
