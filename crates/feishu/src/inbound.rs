//! Parsing of `im.message.receive_v1` event callbacks.

use serde_json::Value;

use crate::post::decode_post;

/// Placeholder text for image-only messages; the key travels separately.
const IMAGE_PLACEHOLDER: &str = "[图片]";

/// One inbound chat message, extracted from an event callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_open_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
    pub image_keys: Vec<String>,
    /// Whether the bot's own open id appears in the message's mentions.
    pub addressed_to_bot: bool,
}

/// Parse an event callback into an [`InboundMessage`].
///
/// Returns `None` for event types other than message receive, senders
/// without an open id, and message types we cannot turn into text.
#[must_use]
pub fn parse_message_event(payload: &Value, bot_open_id: Option<&str>) -> Option<InboundMessage> {
    let event_type = payload
        .pointer("/header/event_type")
        .and_then(Value::as_str)?;
    if event_type != "im.message.receive_v1" {
        return None;
    }
    let event = payload.get("event")?;

    let sender_open_id = event
        .pointer("/sender/sender_id/open_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?
        .to_owned();
    let message = event.get("message")?;
    let chat_id = message.get("chat_id").and_then(Value::as_str)?.to_owned();
    let message_id = message.get("message_id").and_then(Value::as_str)?.to_owned();
    let msg_type = message.get("message_type").and_then(Value::as_str)?;
    let content = message.get("content").and_then(Value::as_str).unwrap_or("");

    let (text, image_keys) = match msg_type {
        "text" => {
            let text = serde_json::from_str::<Value>(content)
                .ok()
                .and_then(|v| v.get("text").and_then(Value::as_str).map(String::from))
                .filter(|t| !t.is_empty())?;
            (text, Vec::new())
        },
        "post" => {
            let decoded = decode_post(content);
            (decoded.text_content, decoded.image_keys)
        },
        "image" => {
            let key = serde_json::from_str::<Value>(content)
                .ok()
                .and_then(|v| v.get("image_key").and_then(Value::as_str).map(String::from))?;
            (IMAGE_PLACEHOLDER.to_owned(), vec![key])
        },
        _ => return None,
    };

    let addressed_to_bot = bot_open_id.is_some_and(|bot_id| {
        message
            .get("mentions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .any(|mention| {
                mention.pointer("/id/open_id").and_then(Value::as_str) == Some(bot_id)
            })
    });

    Some(InboundMessage {
        sender_open_id,
        chat_id,
        message_id,
        text,
        image_keys,
        addressed_to_bot,
    })
}
