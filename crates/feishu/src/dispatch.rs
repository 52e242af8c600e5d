//! Per-reply delivery pipeline.
//!
//! One [`ReplyDispatcher`] is built per outgoing reply context (chat id plus
//! optional reply-to message id) and walks each payload through filtering,
//! localization, render-mode selection, chunking and sequential sends. Send
//! failures are reported to the observer and force the typing cue off; they
//! never propagate past this module.

use {
    regex::Regex,
    std::sync::{Arc, LazyLock},
    tracing::{debug, info, warn},
};

use aviary_common::types::{MentionTarget, ReplyKind, ReplyPayload};

use crate::{
    config::{ChunkMode, FeishuAccountConfig, RenderMode, TableMode},
    error::{Error, Result},
    localize::localize_tool_message,
    render::select_render_mode,
    send::{MessageType, ReplySender},
    text::{chunk_text, convert_markdown_tables},
    typing::TypingIndicator,
};

#[allow(clippy::expect_used)]
static PROCESS_POLL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)process:\s*poll\b").expect("static pattern"));

/// Whether a tool status message is a background process-poll summary.
/// Inline-code backticks are stripped before matching.
#[must_use]
pub fn is_process_poll_summary(text: &str) -> bool {
    PROCESS_POLL.is_match(&text.replace('`', ""))
}

/// Receives dispatch lifecycle notifications. All methods are logging-only
/// hooks; none may block or fail the delivery path.
pub trait DispatchObserver: Send + Sync {
    fn on_typing_start_error(&self, error: &Error);
    fn on_typing_stop_error(&self, error: &Error);
    fn on_send_error(&self, kind: ReplyKind, error: &Error);
    fn on_idle(&self) {}
}

/// Default observer: structured warnings via `tracing`.
#[derive(Debug, Clone)]
pub struct LogObserver {
    pub account_id: String,
    pub chat_id: String,
}

impl DispatchObserver for LogObserver {
    fn on_typing_start_error(&self, error: &Error) {
        warn!(
            account = %self.account_id,
            chat = %self.chat_id,
            error = %error,
            "failed to add typing indicator reaction"
        );
    }

    fn on_typing_stop_error(&self, error: &Error) {
        warn!(
            account = %self.account_id,
            chat = %self.chat_id,
            error = %error,
            "failed to remove typing indicator reaction"
        );
    }

    fn on_send_error(&self, kind: ReplyKind, error: &Error) {
        warn!(
            account = %self.account_id,
            chat = %self.chat_id,
            kind = %kind,
            error = %error,
            "reply delivery failed"
        );
    }
}

/// Read-only configuration slice the dispatcher consumes.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub render_mode: RenderMode,
    pub suppress_process_poll: bool,
    pub chunk_limit: usize,
    pub chunk_mode: ChunkMode,
    pub table_mode: TableMode,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&FeishuAccountConfig::default())
    }
}

impl From<&FeishuAccountConfig> for DispatchSettings {
    fn from(config: &FeishuAccountConfig) -> Self {
        Self {
            render_mode: config.render_mode.clone(),
            suppress_process_poll: config.tool_messages.suppress_process_poll,
            chunk_limit: config.text_chunk_limit,
            chunk_mode: config.chunk_mode,
            table_mode: config.table_mode,
        }
    }
}

/// Delivers the replies of one reply cycle, in order.
pub struct ReplyDispatcher {
    sender: Arc<dyn ReplySender>,
    observer: Arc<dyn DispatchObserver>,
    chat_id: String,
    reply_to: Option<String>,
    mentions: Vec<MentionTarget>,
    settings: DispatchSettings,
    typing: TypingIndicator,
    started: bool,
}

impl ReplyDispatcher {
    #[must_use]
    pub fn new(
        sender: Arc<dyn ReplySender>,
        observer: Arc<dyn DispatchObserver>,
        chat_id: impl Into<String>,
        reply_to: Option<String>,
        mentions: Vec<MentionTarget>,
        settings: DispatchSettings,
    ) -> Self {
        let typing = TypingIndicator::new(reply_to.clone());
        Self {
            sender,
            observer,
            chat_id: chat_id.into(),
            reply_to,
            mentions,
            settings,
            typing,
            started: false,
        }
    }

    /// Fires the cycle's start hook: shows the typing cue. Called implicitly
    /// by the first [`deliver`](Self::deliver) when the caller did not.
    pub async fn begin(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.typing
            .start(self.sender.as_ref(), self.observer.as_ref())
            .await;
    }

    /// Deliver one reply payload. All failures are handled here: reported
    /// through the observer, followed by fail-safe typing cleanup.
    pub async fn deliver(&mut self, payload: &ReplyPayload) {
        let raw = payload.text.as_str();
        if raw.trim().is_empty() {
            debug!(chat = %self.chat_id, "skipping empty reply");
            return;
        }
        if payload.kind.is_tool()
            && self.settings.suppress_process_poll
            && is_process_poll_summary(raw)
        {
            debug!(chat = %self.chat_id, "suppressing process poll summary");
            return;
        }

        let text = if payload.kind.is_tool() {
            localize_tool_message(raw)
        } else {
            raw.to_owned()
        };

        let decision = select_render_mode(&self.settings.render_mode, &text);
        self.begin().await;

        let result = if decision.use_card {
            self.send_card_chunks(&text).await
        } else {
            self.send_message_chunks(&text, decision.use_post).await
        };

        if let Err(error) = result {
            self.observer.on_send_error(payload.kind, &error);
            // Fail-safe: drop the cue no matter what state it tracked.
            self.typing
                .stop(self.sender.as_ref(), self.observer.as_ref())
                .await;
        }
    }

    /// Fires the cycle's idle hook: removes the typing cue and notifies the
    /// observer. Safe to call more than once.
    pub async fn finish(&mut self) {
        self.typing
            .stop(self.sender.as_ref(), self.observer.as_ref())
            .await;
        self.observer.on_idle();
    }

    async fn send_card_chunks(&self, text: &str) -> Result<()> {
        let chunks = chunk_text(text, self.settings.chunk_limit, self.settings.chunk_mode);
        info!(
            chat = %self.chat_id,
            chunk_count = chunks.len(),
            "sending card chunks"
        );
        let mut first = true;
        for chunk in &chunks {
            let mentions = if first { self.mentions.as_slice() } else { &[] };
            self.sender
                .send_card(&self.chat_id, chunk, self.reply_to.as_deref(), mentions)
                .await?;
            first = false;
        }
        Ok(())
    }

    async fn send_message_chunks(&self, text: &str, use_post: bool) -> Result<()> {
        let converted = convert_markdown_tables(text, self.settings.table_mode);
        let chunks = chunk_text(&converted, self.settings.chunk_limit, self.settings.chunk_mode);
        let message_type = if use_post {
            MessageType::Post
        } else {
            MessageType::Text
        };
        info!(
            chat = %self.chat_id,
            chunk_count = chunks.len(),
            message_type = message_type.as_str(),
            "sending message chunks"
        );
        let mut first = true;
        for chunk in &chunks {
            let mentions = if first { self.mentions.as_slice() } else { &[] };
            self.sender
                .send_message(
                    &self.chat_id,
                    chunk,
                    self.reply_to.as_deref(),
                    mentions,
                    message_type,
                )
                .await?;
            first = false;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::typing::TypingIndicatorState,
        async_trait::async_trait,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Message {
            text: String,
            mentions: usize,
            message_type: MessageType,
        },
        Card {
            markdown: String,
            mentions: usize,
        },
        ReactionAdded,
        ReactionRemoved,
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Sent>>,
        fail_sends_after: Option<usize>,
    }

    impl RecordingSender {
        fn failing_after(n: usize) -> Self {
            Self {
                fail_sends_after: Some(n),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<()> {
            let sends = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .filter(|s| matches!(s, Sent::Message { .. } | Sent::Card { .. }))
                .count();
            match self.fail_sends_after {
                Some(limit) if sends >= limit => Err(Error::message("send failed")),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_message(
            &self,
            _chat_id: &str,
            text: &str,
            _reply_to: Option<&str>,
            mentions: &[MentionTarget],
            message_type: MessageType,
        ) -> Result<()> {
            self.check_failure()?;
            self.sent.lock().unwrap().push(Sent::Message {
                text: text.into(),
                mentions: mentions.len(),
                message_type,
            });
            Ok(())
        }

        async fn send_card(
            &self,
            _chat_id: &str,
            markdown: &str,
            _reply_to: Option<&str>,
            mentions: &[MentionTarget],
        ) -> Result<()> {
            self.check_failure()?;
            self.sent.lock().unwrap().push(Sent::Card {
                markdown: markdown.into(),
                mentions: mentions.len(),
            });
            Ok(())
        }

        async fn add_reaction(&self, message_id: &str) -> Result<TypingIndicatorState> {
            self.sent.lock().unwrap().push(Sent::ReactionAdded);
            Ok(TypingIndicatorState {
                message_id: message_id.into(),
                reaction_id: "re_1".into(),
            })
        }

        async fn remove_reaction(&self, _state: &TypingIndicatorState) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::ReactionRemoved);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        send_errors: Mutex<Vec<ReplyKind>>,
        idle_calls: AtomicUsize,
    }

    impl DispatchObserver for RecordingObserver {
        fn on_typing_start_error(&self, _error: &Error) {}
        fn on_typing_stop_error(&self, _error: &Error) {}
        fn on_send_error(&self, kind: ReplyKind, _error: &Error) {
            self.send_errors.lock().unwrap().push(kind);
        }
        fn on_idle(&self) {
            self.idle_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher(
        sender: &Arc<RecordingSender>,
        observer: &Arc<RecordingObserver>,
        reply_to: Option<&str>,
        mentions: Vec<MentionTarget>,
        settings: DispatchSettings,
    ) -> ReplyDispatcher {
        ReplyDispatcher::new(
            Arc::clone(sender) as Arc<dyn ReplySender>,
            Arc::clone(observer) as Arc<dyn DispatchObserver>,
            "oc_chat",
            reply_to.map(String::from),
            mentions,
            settings,
        )
    }

    fn assistant(text: &str) -> ReplyPayload {
        ReplyPayload::new(text, ReplyKind::Assistant)
    }

    fn tool(text: &str) -> ReplyPayload {
        ReplyPayload::new(text, ReplyKind::Tool)
    }

    #[tokio::test]
    async fn empty_text_is_dropped_silently() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(&sender, &observer, None, vec![], DispatchSettings::default());
        d.deliver(&assistant("   \n  ")).await;
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn post_mode_sends_post_chunks() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(&sender, &observer, None, vec![], DispatchSettings::default());
        d.deliver(&assistant("hello")).await;
        assert_eq!(
            sender.sent(),
            vec![Sent::Message {
                text: "hello".into(),
                mentions: 0,
                message_type: MessageType::Post,
            }]
        );
    }

    #[tokio::test]
    async fn card_mode_sends_cards() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            render_mode: RenderMode::Card,
            ..Default::default()
        };
        let mut d = dispatcher(&sender, &observer, None, vec![], settings);
        d.deliver(&assistant("hello")).await;
        assert_eq!(
            sender.sent(),
            vec![Sent::Card {
                markdown: "hello".into(),
                mentions: 0,
            }]
        );
    }

    #[tokio::test]
    async fn mentions_attach_only_to_first_chunk() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            render_mode: RenderMode::Raw,
            chunk_limit: 10,
            ..Default::default()
        };
        let mentions = vec![MentionTarget::new("ou_1", "Ada")];
        let mut d = dispatcher(&sender, &observer, None, mentions, settings);
        d.deliver(&assistant("line one\nline two\nline three")).await;

        let sent = sender.sent();
        let mention_counts: Vec<usize> = sent
            .iter()
            .filter_map(|s| match s {
                Sent::Message { mentions, .. } => Some(*mentions),
                _ => None,
            })
            .collect();
        assert!(mention_counts.len() > 1, "expected multiple chunks: {sent:?}");
        assert_eq!(mention_counts[0], 1);
        assert!(mention_counts[1..].iter().all(|&n| n == 0));
    }

    #[tokio::test]
    async fn tool_messages_are_localized() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            render_mode: RenderMode::Raw,
            ..Default::default()
        };
        let mut d = dispatcher(&sender, &observer, None, vec![], settings);
        d.deliver(&tool("exec: cargo test")).await;
        assert_eq!(
            sender.sent(),
            vec![Sent::Message {
                text: "正在执行: cargo test".into(),
                mentions: 0,
                message_type: MessageType::Text,
            }]
        );
    }

    #[tokio::test]
    async fn process_poll_summary_is_suppressed() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(&sender, &observer, None, vec![], DispatchSettings::default());
        d.deliver(&tool("⚙️ `process: poll` session 42")).await;
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn process_poll_suppression_can_be_disabled() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            suppress_process_poll: false,
            render_mode: RenderMode::Raw,
            ..Default::default()
        };
        let mut d = dispatcher(&sender, &observer, None, vec![], settings);
        d.deliver(&tool("process: poll session 42")).await;
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn assistant_process_poll_text_is_not_suppressed() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(&sender, &observer, None, vec![], DispatchSettings::default());
        d.deliver(&assistant("the agent ran process: poll")).await;
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn cycle_brackets_sends_with_typing_reactions() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(
            &sender,
            &observer,
            Some("om_1"),
            vec![],
            DispatchSettings::default(),
        );
        d.begin().await;
        d.deliver(&assistant("hello")).await;
        d.finish().await;

        let sent = sender.sent();
        assert_eq!(sent.first(), Some(&Sent::ReactionAdded));
        assert_eq!(sent.last(), Some(&Sent::ReactionRemoved));
        assert_eq!(observer.idle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_failure_reports_kind_and_stops_typing() {
        let sender = Arc::new(RecordingSender::failing_after(0));
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(
            &sender,
            &observer,
            Some("om_1"),
            vec![],
            DispatchSettings::default(),
        );
        d.begin().await;
        d.deliver(&assistant("hello")).await;

        assert_eq!(
            observer.send_errors.lock().unwrap().as_slice(),
            &[ReplyKind::Assistant]
        );
        // typing reaction added at begin, removed by the fail-safe
        let sent = sender.sent();
        assert_eq!(sent, vec![Sent::ReactionAdded, Sent::ReactionRemoved]);
    }

    #[tokio::test]
    async fn failure_mid_cycle_stops_at_first_error() {
        let sender = Arc::new(RecordingSender::failing_after(1));
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            render_mode: RenderMode::Raw,
            chunk_limit: 10,
            ..Default::default()
        };
        let mut d = dispatcher(&sender, &observer, None, vec![], settings);
        d.deliver(&assistant("line one\nline two\nline three")).await;

        let message_count = sender
            .sent()
            .iter()
            .filter(|s| matches!(s, Sent::Message { .. }))
            .count();
        assert_eq!(message_count, 1);
        assert_eq!(observer.send_errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_is_idempotent() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut d = dispatcher(
            &sender,
            &observer,
            Some("om_1"),
            vec![],
            DispatchSettings::default(),
        );
        d.begin().await;
        d.finish().await;
        d.finish().await;
        let removals = sender
            .sent()
            .iter()
            .filter(|s| matches!(s, Sent::ReactionRemoved))
            .count();
        assert_eq!(removals, 1);
    }

    #[tokio::test]
    async fn tables_are_converted_outside_card_mode() {
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(RecordingObserver::default());
        let settings = DispatchSettings {
            render_mode: RenderMode::Raw,
            table_mode: TableMode::List,
            ..Default::default()
        };
        let mut d = dispatcher(&sender, &observer, None, vec![], settings);
        d.deliver(&assistant("| Name | Age |\n|---|---|\n| Alice | 30 |"))
            .await;
        let sent = sender.sent();
        let Some(Sent::Message { text, .. }) = sent.first() else {
            panic!("expected a message: {sent:?}");
        };
        assert!(text.contains("**Alice**"), "{text}");
        assert!(text.contains("Age: 30"), "{text}");
    }

    #[test]
    fn process_poll_signature_matching() {
        assert!(is_process_poll_summary("process: poll"));
        assert!(is_process_poll_summary("`process: poll` (id 3)"));
        assert!(is_process_poll_summary("Process:poll"));
        assert!(!is_process_poll_summary("process: polling is great"));
        assert!(!is_process_poll_summary("processing: poll"));
    }
}
