//! Block Kit surfaces for the publish form.
//!
//! Provides:
//! - Typed blocks, elements and text objects
//! - The modal opened from the message shortcut
//! - The ephemeral CONFIRM / CANCEL prompt posted after a mention

use grab_core::PublishForm;
use serde::{Deserialize, Serialize};

use crate::interactions::SHORTCUT_CALLBACK_ID;

/// Action ID of the article title input.
pub const FIELD_TITLE: &str = "article_title";
/// Action ID of the section title input.
pub const FIELD_SECTION: &str = "article_section";
/// Action ID of the overwrite checkbox.
pub const FIELD_CLOBBER: &str = "clobber";
/// Action ID of the start-message link input.
pub const FIELD_RANGE_START: &str = "range_start";
/// Block holding the range start input, for modal validation errors.
pub const BLOCK_RANGE_START: &str = "Start From";
/// Value of the checked overwrite option.
pub const CLOBBER_CONFIRMED: &str = "confirmed";
/// Action ID of the confirm button.
pub const ACTION_CONFIRM: &str = "append_thread_transcript_confirm";
/// Action ID of the cancel button.
pub const ACTION_CANCEL: &str = "append_thread_transcript_cancel";

/// Slack Block Kit block types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Section block (main content).
    Section { text: SlackTextObject },
    /// Input block wrapping one form element.
    Input {
        block_id: String,
        label: SlackTextObject,
        element: SlackBlockElement,
        #[serde(default)]
        optional: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<SlackTextObject>,
    },
    /// Actions block (buttons).
    Actions {
        block_id: String,
        elements: Vec<SlackBlockElement>,
    },
    /// Context block (small print).
    Context { elements: Vec<SlackTextObject> },
}

/// Slack text object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackTextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
}

impl SlackTextObject {
    /// Create a plain text object.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text: text.into(),
        }
    }

    /// Create a mrkdwn text object.
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}

/// One option of a checkbox group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackOption {
    pub text: SlackTextObject,
    pub value: String,
}

/// Slack block element (inputs and buttons).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlockElement {
    /// Single-line text input.
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<SlackTextObject>,
    },
    /// Checkbox group.
    Checkboxes {
        action_id: String,
        options: Vec<SlackOption>,
    },
    /// Button element.
    Button {
        text: SlackTextObject,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
}

/// A modal view for `views.open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackView {
    #[serde(rename = "type")]
    pub view_type: String,
    pub callback_id: String,
    pub private_metadata: String,
    pub title: SlackTextObject,
    pub submit: SlackTextObject,
    pub close: SlackTextObject,
    pub blocks: Vec<SlackBlock>,
}

fn text_input(block_id: &str, label: &str, action_id: &str, placeholder: &str) -> SlackBlock {
    SlackBlock::Input {
        block_id: block_id.to_string(),
        label: SlackTextObject::plain(label),
        element: SlackBlockElement::PlainTextInput {
            action_id: action_id.to_string(),
            placeholder: Some(SlackTextObject::plain(placeholder)),
        },
        optional: true,
        hint: None,
    }
}

/// The inputs shared by both form surfaces.
pub fn form_inputs(offer_range_start: bool) -> Vec<SlackBlock> {
    let mut blocks = vec![
        text_input(
            "Article Title",
            "Article Title",
            FIELD_TITLE,
            "Defaults to the start of the first message",
        ),
        text_input(
            "Article Section",
            "Article Section",
            FIELD_SECTION,
            "Leave empty to write to the whole article",
        ),
        SlackBlock::Input {
            block_id: "Clobber".to_string(),
            label: SlackTextObject::plain("Clobber"),
            element: SlackBlockElement::Checkboxes {
                action_id: FIELD_CLOBBER.to_string(),
                options: vec![SlackOption {
                    text: SlackTextObject::plain("Overwrite existing content"),
                    value: CLOBBER_CONFIRMED.to_string(),
                }],
            },
            optional: true,
            hint: Some(SlackTextObject::plain(
                "An overwritten section is moved to the end of the article.",
            )),
        },
    ];

    if offer_range_start {
        blocks.push(text_input(
            BLOCK_RANGE_START,
            "Start from message link",
            FIELD_RANGE_START,
            "Paste a link to an earlier message in this channel",
        ));
    }

    blocks
}

/// Modal opened from the message shortcut. The correlation rides in
/// `private_metadata`.
pub fn publish_modal(form: &PublishForm) -> SlackView {
    SlackView {
        view_type: "modal".to_string(),
        callback_id: SHORTCUT_CALLBACK_ID.to_string(),
        private_metadata: form.correlation.encode(),
        title: SlackTextObject::plain("Grab thread"),
        submit: SlackTextObject::plain("Save"),
        close: SlackTextObject::plain("Cancel"),
        blocks: form_inputs(form.offer_range_start),
    }
}

/// Ephemeral prompt posted after a mention. Both buttons carry the
/// correlation in their `value`.
pub fn ephemeral_prompt(form: &PublishForm) -> Vec<SlackBlock> {
    let token = form.correlation.encode();

    let mut blocks = vec![SlackBlock::Section {
        text: SlackTextObject::mrkdwn("Save this thread to the wiki?"),
    }];
    blocks.extend(form_inputs(form.offer_range_start));
    blocks.push(SlackBlock::Actions {
        block_id: "Grab Actions".to_string(),
        elements: vec![
            SlackBlockElement::Button {
                text: SlackTextObject::plain("CONFIRM"),
                action_id: ACTION_CONFIRM.to_string(),
                value: Some(token.clone()),
                style: Some("primary".to_string()),
            },
            SlackBlockElement::Button {
                text: SlackTextObject::plain("CANCEL"),
                action_id: ACTION_CANCEL.to_string(),
                value: Some(token),
                style: Some("danger".to_string()),
            },
        ],
    });
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use grab_core::{Correlation, ThreadReference};

    fn form() -> PublishForm {
        PublishForm::new(Correlation {
            team_id: "T1".into(),
            channel_id: "C1".into(),
            user_id: "U1".into(),
            reference: ThreadReference::thread("10.0"),
            response_url: None,
        })
    }

    #[test]
    fn test_modal_carries_correlation() {
        let form = form();
        let view = publish_modal(&form);
        assert_eq!(view.callback_id, SHORTCUT_CALLBACK_ID);
        assert_eq!(
            Correlation::decode(&view.private_metadata).unwrap(),
            form.correlation
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "modal");
        assert_eq!(json["blocks"].as_array().unwrap().len(), 3);
        assert_eq!(json["blocks"][0]["type"], "input");
        assert_eq!(json["blocks"][0]["element"]["type"], "plain_text_input");
        assert_eq!(json["blocks"][2]["element"]["options"][0]["value"], "confirmed");
    }

    #[test]
    fn test_range_field_only_when_offered() {
        let view = publish_modal(&form().with_range_start(true));
        let json = serde_json::to_value(&view).unwrap();
        let blocks = json["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[3]["element"]["action_id"], FIELD_RANGE_START);
    }

    #[test]
    fn test_ephemeral_prompt_buttons() {
        let form = form();
        let json = serde_json::to_value(ephemeral_prompt(&form)).unwrap();
        let blocks = json.as_array().unwrap();
        let actions = blocks.last().unwrap();
        assert_eq!(actions["type"], "actions");
        assert_eq!(actions["elements"][0]["action_id"], ACTION_CONFIRM);
        assert_eq!(actions["elements"][1]["action_id"], ACTION_CANCEL);

        let token = actions["elements"][0]["value"].as_str().unwrap();
        assert_eq!(Correlation::decode(token).unwrap(), form.correlation);
    }
}
