//! At-mention rendering for text and card bodies.
//!
//! Post bodies carry native `at` elements instead (see [`crate::post`]);
//! plain text and card markdown use the `<at user_id="..">` wire tag.

use aviary_common::types::MentionTarget;

/// Render one mention as the channel's inline at-tag.
#[must_use]
pub fn at_tag(target: &MentionTarget) -> String {
    format!("<at user_id=\"{}\">{}</at>", target.id, target.name)
}

/// Prefix `text` with at-tags for each mention, in input order.
/// Returns the text unchanged when there are no mentions.
#[must_use]
pub fn prepend_mentions(text: &str, mentions: &[MentionTarget]) -> String {
    if mentions.is_empty() {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len() + mentions.len() * 32);
    for target in mentions {
        out.push_str(&at_tag(target));
        out.push(' ');
    }
    out.push_str(text);
    out
}
