use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Instant,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    tracing::{info, warn},
};

use {
    aviary_channels::{
        ChannelEvent, ChannelEventSink, ChannelMessageMeta, ChannelReplyTarget,
        Error as ChannelError,
        plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus},
    },
    aviary_common::types::{MentionTarget, ReplyKind, ReplyPayload},
};

use crate::{
    client::FeishuClient,
    config::FeishuAccountConfig,
    dispatch::{DispatchSettings, LogObserver, ReplyDispatcher},
    inbound,
    send::ReplySender,
    state::{AccountState, AccountStateMap},
};

/// Cache TTL for probe results (30 seconds).
const PROBE_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30);

/// Feishu/Lark channel plugin.
pub struct FeishuPlugin {
    accounts: AccountStateMap,
    outbound: FeishuOutbound,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
    probe_cache: RwLock<HashMap<String, (ChannelHealthSnapshot, Instant)>>,
}

impl FeishuPlugin {
    #[must_use]
    pub fn new() -> Self {
        let accounts: AccountStateMap = Arc::new(RwLock::new(HashMap::new()));
        let outbound = FeishuOutbound {
            accounts: Arc::clone(&accounts),
        };
        Self {
            accounts,
            outbound,
            event_sink: None,
            probe_cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn ChannelEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Get a shared reference to the outbound sender (for use outside the plugin).
    #[must_use]
    pub fn shared_outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::new(FeishuOutbound {
            accounts: Arc::clone(&self.accounts),
        })
    }

    /// List all active account IDs.
    #[must_use]
    pub fn account_ids(&self) -> Vec<String> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts.keys().cloned().collect()
    }

    /// Handle an event callback delivered by the host's webhook endpoint.
    /// Messages flow to the event sink; unknown events are ignored.
    pub async fn handle_event(&self, account_id: &str, payload: &serde_json::Value) -> Result<()> {
        let bot_open_id = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            let state = accounts
                .get(account_id)
                .ok_or_else(|| ChannelError::unknown_account(account_id))?;
            state.config.bot_open_id.clone()
        };

        let Some(message) = inbound::parse_message_event(payload, bot_open_id.as_deref()) else {
            return Ok(());
        };
        let Some(sink) = self.event_sink.as_ref() else {
            return Ok(());
        };

        sink.emit(ChannelEvent::InboundMessage {
            channel_type: "feishu".into(),
            account_id: account_id.to_owned(),
            peer_id: message.sender_open_id.clone(),
            sender_name: None,
            addressed_to_bot: message.addressed_to_bot,
        })
        .await;

        sink.dispatch_to_chat(
            &message.text,
            ChannelReplyTarget {
                channel_type: "feishu".into(),
                account_id: account_id.to_owned(),
                chat_id: message.chat_id.clone(),
                reply_to_message_id: Some(message.message_id.clone()),
            },
            ChannelMessageMeta {
                channel_type: "feishu".into(),
                sender_name: None,
                mention: None,
            },
        )
        .await;

        Ok(())
    }
}

impl Default for FeishuPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for FeishuPlugin {
    fn id(&self) -> &str {
        "feishu"
    }

    fn name(&self) -> &str {
        "Feishu"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let config: FeishuAccountConfig = serde_json::from_value(config)?;

        if config.app_id.is_empty() {
            return Err(ChannelError::invalid_input("feishu app_id is required").into());
        }
        {
            use secrecy::ExposeSecret;
            if config.app_secret.expose_secret().is_empty() {
                return Err(ChannelError::invalid_input("feishu app_secret is required").into());
            }
        }

        info!(account_id, app_id = %config.app_id, "starting feishu account");

        let client = Arc::new(FeishuClient::new(&config));
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(
            account_id.to_owned(),
            AccountState {
                account_id: account_id.to_owned(),
                config,
                client,
            },
        );
        Ok(())
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        if accounts.remove(account_id).is_some() {
            info!(account_id, "stopped feishu account");
        } else {
            warn!(account_id, "feishu account not found");
        }
        Ok(())
    }

    fn outbound(&self) -> Option<&dyn ChannelOutbound> {
        Some(&self.outbound)
    }

    fn status(&self) -> Option<&dyn ChannelStatus> {
        Some(self)
    }
}

#[async_trait]
impl ChannelStatus for FeishuPlugin {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot> {
        // Return cached result if fresh enough.
        if let Ok(cache) = self.probe_cache.read()
            && let Some((snapshot, at)) = cache.get(account_id)
            && at.elapsed() < PROBE_CACHE_TTL
        {
            return Ok(snapshot.clone());
        }

        let client = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            accounts
                .get(account_id)
                .map(|s| (Arc::clone(&s.client), s.config.app_id.clone()))
        };

        let result = match client {
            Some((client, app_id)) => match client.health_check().await {
                Ok(()) => ChannelHealthSnapshot {
                    connected: true,
                    account_id: account_id.to_owned(),
                    details: Some(format!("App: {app_id}")),
                },
                Err(e) => ChannelHealthSnapshot {
                    connected: false,
                    account_id: account_id.to_owned(),
                    details: Some(format!("API error: {e}")),
                },
            },
            None => ChannelHealthSnapshot {
                connected: false,
                account_id: account_id.to_owned(),
                details: Some("account not started".into()),
            },
        };

        if let Ok(mut cache) = self.probe_cache.write() {
            cache.insert(account_id.to_owned(), (result.clone(), Instant::now()));
        }

        Ok(result)
    }
}

/// Outbound message sender for Feishu.
pub struct FeishuOutbound {
    pub(crate) accounts: AccountStateMap,
}

impl FeishuOutbound {
    /// Build a dispatcher for one reply cycle against an account.
    fn dispatcher(
        &self,
        account_id: &str,
        chat_id: &str,
        reply_to: Option<String>,
        mentions: Vec<MentionTarget>,
    ) -> Result<ReplyDispatcher> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let state = accounts
            .get(account_id)
            .ok_or_else(|| ChannelError::unknown_account(account_id))?;
        let observer = LogObserver {
            account_id: account_id.to_owned(),
            chat_id: chat_id.to_owned(),
        };
        Ok(ReplyDispatcher::new(
            Arc::clone(&state.client) as Arc<dyn ReplySender>,
            Arc::new(observer),
            chat_id,
            reply_to,
            mentions,
            DispatchSettings::from(&state.config),
        ))
    }
}

#[async_trait]
impl ChannelOutbound for FeishuOutbound {
    async fn send_text(&self, account_id: &str, to: &str, text: &str) -> Result<()> {
        let mut dispatcher = self.dispatcher(account_id, to, None, Vec::new())?;
        dispatcher
            .deliver(&ReplyPayload::new(text, ReplyKind::Assistant))
            .await;
        dispatcher.finish().await;
        Ok(())
    }

    async fn send_reply(
        &self,
        account_id: &str,
        target: &ChannelReplyTarget,
        payload: &ReplyPayload,
        mentions: &[MentionTarget],
    ) -> Result<()> {
        let mut dispatcher = self.dispatcher(
            account_id,
            &target.chat_id,
            target.reply_to_message_id.clone(),
            mentions.to_vec(),
        )?;
        dispatcher.begin().await;
        dispatcher.deliver(payload).await;
        dispatcher.finish().await;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn test_state(account_id: &str) -> AccountState {
        let config = FeishuAccountConfig {
            app_id: "cli_test".into(),
            app_secret: Secret::new("secret".into()),
            ..Default::default()
        };
        AccountState {
            account_id: account_id.into(),
            client: Arc::new(FeishuClient::new(&config)),
            config,
        }
    }

    #[tokio::test]
    async fn start_account_requires_credentials() {
        let mut plugin = FeishuPlugin::new();
        let err = plugin
            .start_account("a1", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("app_id"));

        let err = plugin
            .start_account("a1", serde_json::json!({ "app_id": "cli_x" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("app_secret"));
    }

    #[tokio::test]
    async fn start_and_stop_account_lifecycle() {
        let mut plugin = FeishuPlugin::new();
        plugin
            .start_account(
                "a1",
                serde_json::json!({ "app_id": "cli_x", "app_secret": "s" }),
            )
            .await
            .unwrap();
        assert_eq!(plugin.account_ids(), vec!["a1".to_owned()]);

        plugin.stop_account("a1").await.unwrap();
        assert!(plugin.account_ids().is_empty());

        // stopping again is not an error
        plugin.stop_account("a1").await.unwrap();
    }

    #[tokio::test]
    async fn probe_unknown_account_reports_not_started() {
        let plugin = FeishuPlugin::new();
        let snapshot = plugin.probe("missing").await.unwrap();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.details.as_deref(), Some("account not started"));
    }

    #[tokio::test]
    async fn outbound_rejects_unknown_account() {
        let plugin = FeishuPlugin::new();
        let outbound = plugin.shared_outbound();
        let err = outbound.send_text("missing", "oc_1", "hi").await.unwrap_err();
        assert!(err.to_string().contains("unknown channel account"));
    }

    #[tokio::test]
    async fn handle_event_without_sink_is_ok() {
        let plugin = FeishuPlugin::new();
        {
            let mut accounts = plugin.accounts.write().unwrap();
            accounts.insert("a1".into(), test_state("a1"));
        }
        let payload = serde_json::json!({
            "header": { "event_type": "im.message.receive_v1", "event_id": "ev" },
            "event": {
                "sender": { "sender_id": { "open_id": "ou_s" } },
                "message": {
                    "message_id": "om_1",
                    "chat_id": "oc_1",
                    "message_type": "text",
                    "content": "{\"text\":\"hi\"}",
                    "mentions": []
                }
            }
        });
        plugin.handle_event("a1", &payload).await.unwrap();
    }

    #[tokio::test]
    async fn handle_event_unknown_account_errors() {
        let plugin = FeishuPlugin::new();
        let err = plugin
            .handle_event("missing", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown channel account"));
    }
}
