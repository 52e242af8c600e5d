use {
    anyhow::Result,
    async_trait::async_trait,
    aviary_common::types::{MentionTarget, ReplyPayload},
};

// ── Channel events (pub/sub) ────────────────────────────────────────────────

/// Events emitted by channel plugins for real-time UI updates.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelEvent {
    InboundMessage {
        channel_type: String,
        account_id: String,
        peer_id: String,
        sender_name: Option<String>,
        /// Whether the bot itself was at-mentioned in the message.
        addressed_to_bot: bool,
    },
}

/// Sink for channel events — the host gateway provides the concrete
/// implementation.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Broadcast a channel event for real-time UI updates.
    async fn emit(&self, event: ChannelEvent);

    /// Dispatch an inbound message to the main chat session. Replies are
    /// routed back to the originating channel through [`ChannelOutbound`].
    async fn dispatch_to_chat(
        &self,
        text: &str,
        reply_to: ChannelReplyTarget,
        meta: ChannelMessageMeta,
    );
}

/// Metadata about a channel message, used for UI display and reply routing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelMessageMeta {
    pub channel_type: String,
    pub sender_name: Option<String>,
    /// Who to at-mention when replying, if the chat etiquette calls for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention: Option<MentionTarget>,
}

/// Where to send the generated response back.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelReplyTarget {
    pub channel_type: String,
    pub account_id: String,
    /// Chat/peer ID to send the reply to.
    pub chat_id: String,
    /// Message being answered, for threading and typing cues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
}

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "feishu").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start an account connection.
    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()>;

    /// Stop an account connection.
    async fn stop_account(&mut self, account_id: &str) -> Result<()>;

    /// Get outbound adapter for sending messages.
    fn outbound(&self) -> Option<&dyn ChannelOutbound>;

    /// Get status adapter for health checks.
    fn status(&self) -> Option<&dyn ChannelStatus>;
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send plain text with no reply context.
    async fn send_text(&self, account_id: &str, to: &str, text: &str) -> Result<()>;

    /// Deliver a generated reply into the chat it answers, with the
    /// channel's full rendering treatment (chunking, rich text, mentions).
    async fn send_reply(
        &self,
        account_id: &str,
        target: &ChannelReplyTarget,
        payload: &ReplyPayload,
        mentions: &[MentionTarget],
    ) -> Result<()>;

    /// Show a typing cue for the message being answered. No-op by default.
    async fn send_typing(&self, _account_id: &str, _target: &ChannelReplyTarget) -> Result<()> {
        Ok(())
    }
}

/// Probe channel account health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot>;
}

/// Channel health snapshot.
#[derive(Debug, Clone)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub account_id: String,
    pub details: Option<String>,
}
