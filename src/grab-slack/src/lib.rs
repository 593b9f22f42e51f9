//! Slack side of Grab.
//!
//! This crate provides:
//! - A Web API client bound to one workspace bot token
//! - `SlackSource`, the `ChatSource` used by the publish orchestrator
//! - mrkdwn to Markdown conversion
//! - Events API and interactivity payload types
//! - Block Kit forms (modal and ephemeral prompt)
//! - Request signature verification and the OAuth code exchange
//!
//! # Example
//!
//! ```rust,ignore
//! use grab_slack::{SlackClient, SlackSource};
//!
//! let client = SlackClient::new(instance_token)?;
//! let source = SlackSource::new(client);
//! let thread = source.fetch_by_thread_reference("C024BE91L", "1700000000.000100").await?;
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `SLACK_SIGNING_SECRET` - Signing secret for request verification
//!
//! Optional:
//! - `SLACK_CLIENT_ID` / `SLACK_CLIENT_SECRET` - For the OAuth install flow
//! - `SLACK_REDIRECT_URI` - Redirect registered with the app
//! - `SLACK_API_BASE` - Web API base URL

pub mod blocks;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod interactions;
pub mod mrkdwn;
pub mod oauth;
pub mod signature;
pub mod source;

// Re-export main types
pub use client::{DelayedResponse, RawMessage, SlackClient};
pub use config::SlackAppConfig;
pub use error::{SlackError, SlackResult};
pub use events::{EventEnvelope, InnerEvent, NOT_IN_THREAD_NOTICE};
pub use interactions::{FormDecision, FormValues, InteractionForm, InteractionPayload};
pub use mrkdwn::mrkdwn_to_markdown;
pub use oauth::{Installation, OAuthClient};
pub use signature::SignatureVerifier;
pub use source::{BotIdentity, SlackSource};
