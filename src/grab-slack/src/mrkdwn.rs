//! Slack mrkdwn to Markdown.
//!
//! Code spans are cut out first and copied through untouched. Link tokens
//! are cut out next so emphasis markers inside a URL survive; only a link's
//! label gets the emphasis rewrites. Everything else goes through the inline
//! rewrites in a fixed order.

use std::sync::LazyLock;

use regex::Regex;

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```|`[^`\n]*`").expect("Invalid code span regex"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B\*([^*\s](?:[^*\n]*[^*\s])?)\*\B").expect("Invalid bold regex"));

static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^_\s](?:[^_\n]*[^_\s])?)_\b").expect("Invalid italic regex"));

static STRIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B~([^~\s](?:[^~\n]*[^~\s])?)~\B").expect("Invalid strikethrough regex"));

static LINK_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:https?://|mailto:)[^|>\s]+(?:\|[^>]+)?>").expect("Invalid link token regex")
});

static LABELED_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(https?://[^|>\s]+|mailto:[^|>\s]+)\|([^>]+)>").expect("Invalid labeled link regex")
});

static BARE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(https?://[^|>\s]+|mailto:[^|>\s]+)>").expect("Invalid bare link regex")
});

/// Translate one message body.
pub fn mrkdwn_to_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;

    for span in CODE_SPAN.find_iter(text) {
        out.push_str(&rewrite_inline(&text[last..span.start()]));
        out.push_str(span.as_str());
        last = span.end();
    }
    out.push_str(&rewrite_inline(&text[last..]));
    out
}

fn rewrite_inline(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(segment.len());
    let mut last = 0;

    for token in LINK_TOKEN.find_iter(segment) {
        out.push_str(&emphasis(&segment[last..token.start()]));
        out.push_str(&link(token.as_str()));
        last = token.end();
    }
    out.push_str(&emphasis(&segment[last..]));
    unescape(&out)
}

fn emphasis(text: &str) -> String {
    let text = BOLD.replace_all(text, "**$1**");
    let text = ITALIC.replace_all(&text, "*$1*");
    STRIKE.replace_all(&text, "~~$1~~").into_owned()
}

fn link(token: &str) -> String {
    match LABELED_LINK.captures(token) {
        Some(caps) => format!("[{}]({})", emphasis(&caps[2]), &caps[1]),
        None => BARE_LINK.replace(token, "$1").into_owned(),
    }
}

/// Slack escapes these three in message text.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
