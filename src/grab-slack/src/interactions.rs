//! Interactivity payloads: message shortcuts, button clicks and modal
//! submissions.
//!
//! Slack posts these form-encoded, with the JSON in a single `payload`
//! field. The HTTP layer decodes the form into `InteractionForm`.

use std::collections::HashMap;

use grab_core::{Correlation, PublishRequest, ThreadReference};
use serde::{Deserialize, Serialize};

use crate::blocks::{
    ACTION_CANCEL, ACTION_CONFIRM, CLOBBER_CONFIRMED, FIELD_CLOBBER, FIELD_RANGE_START,
    FIELD_SECTION, FIELD_TITLE,
};
use crate::error::{SlackError, SlackResult};

/// Callback ID of the message shortcut and of the modal it opens.
pub const SHORTCUT_CALLBACK_ID: &str = "grab_thread";

/// Top-level interaction payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionPayload {
    /// A message shortcut was used.
    MessageAction(MessageAction),
    /// A button in a message was clicked.
    BlockActions(BlockActions),
    /// A modal was submitted.
    ViewSubmission(ViewSubmission),
    /// Anything else (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// Form body of an interactivity request.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    /// JSON-encoded `InteractionPayload`.
    pub payload: String,
}

impl InteractionForm {
    /// Parse the JSON payload.
    pub fn parse(&self) -> SlackResult<InteractionPayload> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

/// `message_action` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageAction {
    pub callback_id: String,
    pub trigger_id: String,
    pub team: IdRef,
    pub channel: IdRef,
    pub user: IdRef,
    pub message: ShortcutMessage,
    #[serde(default)]
    pub response_url: Option<String>,
}

/// The message the shortcut was used on.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutMessage {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl MessageAction {
    /// Conversation the shortcut points at, and whether the form should
    /// offer an earlier start message.
    ///
    /// A message inside a thread (or a thread root) selects the whole
    /// thread. A plain channel message selects itself and may become the
    /// end of a range.
    pub fn reference(&self) -> (ThreadReference, bool) {
        match &self.message.thread_ts {
            Some(root) => (ThreadReference::thread(root.clone()), false),
            None => (ThreadReference::thread(self.message.ts.clone()), true),
        }
    }

    /// Correlation to carry through the modal.
    pub fn correlation(&self) -> Correlation {
        Correlation {
            team_id: self.team.id.clone(),
            channel_id: self.channel.id.clone(),
            user_id: self.user.id.clone(),
            reference: self.reference().0,
            response_url: None,
        }
    }
}

/// `block_actions` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockActions {
    pub team: IdRef,
    pub user: IdRef,
    #[serde(default)]
    pub channel: Option<IdRef>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    #[serde(default)]
    pub state: Option<ViewState>,
}

/// One clicked element.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// What the user did with an ephemeral form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormDecision {
    Confirm(Correlation),
    Cancel(Correlation),
}

impl BlockActions {
    /// Interpret the click. Returns `None` for actions that are not ours.
    ///
    /// The correlation is taken from the button value and completed with
    /// this payload's `response_url`.
    pub fn decision(&self) -> SlackResult<Option<FormDecision>> {
        let Some(action) = self
            .actions
            .iter()
            .find(|a| a.action_id == ACTION_CONFIRM || a.action_id == ACTION_CANCEL)
        else {
            return Ok(None);
        };

        let token = action
            .value
            .as_deref()
            .ok_or_else(|| SlackError::InvalidPayload("button has no value".to_string()))?;
        let mut correlation = Correlation::decode(token)
            .map_err(|e| SlackError::InvalidPayload(e.to_string()))?;
        if self.response_url.is_some() {
            correlation.response_url = self.response_url.clone();
        }

        Ok(Some(if action.action_id == ACTION_CONFIRM {
            FormDecision::Confirm(correlation)
        } else {
            FormDecision::Cancel(correlation)
        }))
    }

    /// Form inputs present in the message when the button was clicked.
    pub fn values(&self) -> FormValues {
        self.state.as_ref().map(FormValues::from).unwrap_or_default()
    }
}

/// `view_submission` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewSubmission {
    pub team: IdRef,
    pub user: IdRef,
    pub view: SubmittedView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedView {
    pub callback_id: String,
    #[serde(default)]
    pub private_metadata: String,
    #[serde(default)]
    pub state: ViewState,
}

impl ViewSubmission {
    /// Decode the correlation stored in the modal.
    pub fn correlation(&self) -> SlackResult<Correlation> {
        Correlation::decode(&self.view.private_metadata)
            .map_err(|e| SlackError::InvalidPayload(e.to_string()))
    }

    /// Submitted form inputs.
    pub fn values(&self) -> FormValues {
        FormValues::from(&self.view.state)
    }
}

/// `state.values`: block ID to action ID to element state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, ElementState>>,
}

/// State of one input element.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementState {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

impl ViewState {
    fn element(&self, action_id: &str) -> Option<&ElementState> {
        self.values
            .values()
            .find_map(|actions| actions.get(action_id))
    }

    fn text(&self, action_id: &str) -> Option<String> {
        self.element(action_id).and_then(|e| e.value.clone())
    }
}

/// Values entered in the publish form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub article_title: Option<String>,
    pub section_title: Option<String>,
    pub clobber: bool,
    pub range_start: Option<String>,
}

impl From<&ViewState> for FormValues {
    fn from(state: &ViewState) -> Self {
        let clobber = state.element(FIELD_CLOBBER).is_some_and(|e| {
            e.selected_options
                .iter()
                .any(|o| o.value == CLOBBER_CONFIRMED)
        });
        Self {
            article_title: state.text(FIELD_TITLE),
            section_title: state.text(FIELD_SECTION),
            clobber,
            range_start: state
                .text(FIELD_RANGE_START)
                .filter(|link| !link.trim().is_empty()),
        }
    }
}

impl FormValues {
    /// Build the publish request for a submitted form.
    ///
    /// A start-message link turns a single-message reference into a range
    /// between the linked message and the original one.
    pub fn into_request(self, correlation: &Correlation) -> SlackResult<PublishRequest> {
        let reference = match (&correlation.reference, self.range_start.as_deref()) {
            (ThreadReference::Thread { thread_ts }, Some(link)) => {
                let start = parse_permalink_ts(link).ok_or_else(|| {
                    SlackError::InvalidPayload(format!("not a message link: {}", link.trim()))
                })?;
                range_between(&start, thread_ts)
            }
            (reference, _) => reference.clone(),
        };

        Ok(PublishRequest::new(correlation.channel_id.clone(), reference)
            .with_article_title(self.article_title)
            .with_section_title(self.section_title)
            .with_clobber(self.clobber))
    }
}

/// Extract the message timestamp from a permalink such as
/// `https://acme.slack.com/archives/C024BE91L/p1700000000000100`.
pub fn parse_permalink_ts(link: &str) -> Option<String> {
    let link = link.trim().trim_start_matches('<').trim_end_matches('>');
    let path = link.split(['?', '#', '|']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let digits = segment.strip_prefix('p')?;

    if digits.len() <= 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (secs, micros) = digits.split_at(digits.len() - 6);
    Some(format!("{secs}.{micros}"))
}

/// Range reference with the bounds in chronological order.
pub fn range_between(a: &str, b: &str) -> ThreadReference {
    if ts_key(a) <= ts_key(b) {
        ThreadReference::range(a, b)
    } else {
        ThreadReference::range(b, a)
    }
}

/// Slack timestamps compare as `(seconds, fraction)`, not as floats or
/// strings.
fn ts_key(ts: &str) -> (u64, u64) {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    (secs.parse().unwrap_or(0), frac.parse().unwrap_or(0))
}
