//! Codec for the channel's rich-text ("post") message body format.
//!
//! Wire shape: a JSON object keyed by locale (`zh_cn`, `en_us`), each value
//! `{ title?, content: [[element, ...], ...] }` where an element is tagged
//! with `tag` ∈ `text`/`a`/`at`/`img`/`md`. Outgoing bodies duplicate the
//! same content into both locale slots: the channel requires locale tagging
//! but replies are locale-agnostic.

use {
    aviary_common::types::MentionTarget,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::Result;

/// Sentinel shown when a post body cannot be decoded or decodes to nothing.
pub const RICH_TEXT_PLACEHOLDER: &str = "[富文本消息]";

/// One element of a post paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum PostElement {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "a")]
    Link {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        href: Option<String>,
    },
    #[serde(rename = "at")]
    Mention {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },
    #[serde(rename = "img")]
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_key: Option<String>,
    },
    #[serde(rename = "md")]
    Markdown { text: String },
}

/// One locale slot of a post payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLocaleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: Vec<Vec<PostElement>>,
}

/// Outgoing post payload with both locale slots populated identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    pub zh_cn: PostLocaleContent,
    pub en_us: PostLocaleContent,
}

/// Build the post payload for an outgoing reply: one paragraph holding the
/// mention elements (each followed by a single space) and the message text
/// as a final markdown element.
#[must_use]
pub fn build_post_payload(text: &str, mentions: &[MentionTarget]) -> PostPayload {
    let mut elements = Vec::with_capacity(mentions.len() * 2 + 1);
    for mention in mentions {
        elements.push(PostElement::Mention {
            user_id: Some(mention.id.clone()),
            user_name: Some(mention.name.clone()),
        });
        elements.push(PostElement::Text { text: " ".into() });
    }
    elements.push(PostElement::Markdown { text: text.into() });

    let locale = PostLocaleContent {
        title: None,
        content: vec![elements],
    };
    PostPayload {
        zh_cn: locale.clone(),
        en_us: locale,
    }
}

/// Encode an outgoing reply as a post message body string.
pub fn encode_post(text: &str, mentions: &[MentionTarget]) -> Result<String> {
    Ok(serde_json::to_string(&build_post_payload(text, mentions))?)
}

/// Result of decoding an incoming post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPost {
    pub text_content: String,
    pub image_keys: Vec<String>,
}

impl DecodedPost {
    fn placeholder() -> Self {
        Self {
            text_content: RICH_TEXT_PLACEHOLDER.into(),
            image_keys: Vec::new(),
        }
    }
}

/// Decode an incoming post body into plain text plus embedded image keys.
///
/// Never fails: malformed JSON, an unrecognized shape, or empty content all
/// yield the [`RICH_TEXT_PLACEHOLDER`] sentinel.
#[must_use]
pub fn decode_post(wire: &str) -> DecodedPost {
    let Ok(parsed) = serde_json::from_str::<Value>(wire) else {
        return DecodedPost::placeholder();
    };
    let payload = resolve_locale_payload(&parsed);

    let mut text = match payload.get("title").and_then(Value::as_str) {
        Some(title) if !title.is_empty() => format!("{title}\n\n"),
        _ => String::new(),
    };
    let mut image_keys = Vec::new();

    for paragraph in payload
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(elements) = paragraph.as_array() else {
            continue;
        };
        for element in elements {
            append_element(element, &mut text, &mut image_keys);
        }
        text.push('\n');
    }

    let trimmed = text.trim();
    DecodedPost {
        text_content: if trimmed.is_empty() {
            RICH_TEXT_PLACEHOLDER.into()
        } else {
            trimmed.to_owned()
        },
        image_keys,
    }
}

/// Candidate locale slots, first-match-wins. The bare top-level object is
/// the backward-compat fallback: very old payloads carried `title`/`content`
/// directly.
fn resolve_locale_payload(parsed: &Value) -> &Value {
    const CANDIDATES: [&str; 4] = ["/zh_cn", "/en_us", "/post/zh_cn", "/post/en_us"];
    CANDIDATES
        .iter()
        .filter_map(|pointer| parsed.pointer(pointer))
        .find(|slot| slot.is_object())
        .unwrap_or(parsed)
}

fn append_element(element: &Value, text: &mut String, image_keys: &mut Vec<String>) {
    let str_field = |name: &str| element.get(name).and_then(Value::as_str);
    match element.get("tag").and_then(Value::as_str) {
        Some("text") | Some("md") => text.push_str(str_field("text").unwrap_or_default()),
        Some("a") => {
            text.push_str(str_field("text").or_else(|| str_field("href")).unwrap_or_default());
        },
        Some("at") => {
            let name = str_field("user_name")
                .or_else(|| str_field("user_id"))
                .unwrap_or_default();
            text.push('@');
            text.push_str(name);
        },
        Some("img") => {
            if let Some(key) = str_field("image_key") {
                image_keys.push(key.to_owned());
            }
        },
        _ => {},
    }
}
