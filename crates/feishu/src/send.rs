//! The transport seam the dispatcher sends through.

use {async_trait::async_trait, aviary_common::types::MentionTarget};

use crate::{error::Result, typing::TypingIndicatorState};

/// Wire message type for non-card sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Post,
}

impl MessageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Post => "post",
        }
    }
}

/// Sends replies and manages typing reactions against the chat platform.
/// Implemented by [`crate::client::FeishuClient`]; tests substitute mocks.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send one chunk as plain text or rich text.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
        mentions: &[MentionTarget],
        message_type: MessageType,
    ) -> Result<()>;

    /// Send one chunk as an interactive card rendered from markdown.
    async fn send_card(
        &self,
        chat_id: &str,
        markdown: &str,
        reply_to: Option<&str>,
        mentions: &[MentionTarget],
    ) -> Result<()>;

    /// Add the typing reaction to a message.
    async fn add_reaction(&self, message_id: &str) -> Result<TypingIndicatorState>;

    /// Remove a previously added typing reaction.
    async fn remove_reaction(&self, state: &TypingIndicatorState) -> Result<()>;
}
