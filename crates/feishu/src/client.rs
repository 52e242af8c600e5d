//! HTTP client for the Feishu/Lark open API.
//!
//! Covers exactly what the delivery pipeline needs: tenant token management,
//! message/reply sends (text, post, interactive card) and message reactions.

use {
    reqwest::Method,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    std::time::{Duration, Instant},
    tokio::sync::RwLock,
    tracing::{debug, warn},
};

use {
    async_trait::async_trait,
    aviary_common::types::MentionTarget,
};

use crate::{
    config::FeishuAccountConfig,
    error::{Context, Error, Result},
    mention::prepend_mentions,
    post::encode_post,
    send::{MessageType, ReplySender},
    typing::TypingIndicatorState,
};

/// Business code the API returns for an expired or invalid tenant token.
const INVALID_ACCESS_TOKEN_CODE: i64 = 99_991_663;
/// Refresh the tenant token this long before its announced expiry.
const TOKEN_REFRESH_SKEW: Duration = Duration::from_secs(120);
/// Fallback token TTL when the response carries no expiry.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7200);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_after: Instant,
}

/// Client for one bot account. Cheap to share behind an `Arc`; the token
/// cache is the only interior state.
pub struct FeishuClient {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: Secret<String>,
    typing_emoji: String,
    token: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for FeishuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuClient")
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FeishuClient {
    #[must_use]
    pub fn new(config: &FeishuAccountConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| config.platform.api_base().to_owned());
        Self {
            http: reqwest::Client::new(),
            api_base,
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            typing_emoji: config.typing_emoji.clone(),
            token: RwLock::new(None),
        }
    }

    /// Whether the account can authenticate against the API right now.
    pub async fn health_check(&self) -> Result<()> {
        self.tenant_token().await.map(|_| ())
    }

    async fn tenant_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && Instant::now() < token.refresh_after
            {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.api_base);
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "app_id": self.app_id,
                "app_secret": self.app_secret.expose_secret(),
            }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            return Err(Error::message(format!(
                "tenant token request failed: status={status}, body={body}"
            )));
        }
        let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            return Err(Error::api(code, api_error_message(&body)));
        }
        let value = body
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .context("missing tenant_access_token in response")?
            .to_owned();

        let ttl = body
            .get("expire")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_TOKEN_TTL, Duration::from_secs);
        let refresh_after = Instant::now() + ttl.saturating_sub(TOKEN_REFRESH_SKEW).max(Duration::from_secs(1));

        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_after,
        });
        debug!(app_id = %self.app_id, ttl_secs = ttl.as_secs(), "tenant token refreshed");
        Ok(value)
    }

    async fn invalidate_token(&self) {
        let mut cached = self.token.write().await;
        *cached = None;
    }

    /// Send an authorized request and decode the `{code, msg, data}`
    /// envelope. An invalid-token business code invalidates the cache and
    /// retries exactly once with a fresh token.
    async fn request_api(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut token = self.tenant_token().await?;
        let mut retried = false;
        loop {
            let mut request = self.http.request(method.clone(), url).bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();
            let envelope: Value = response.json().await?;
            let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(-1);

            if !retried && (status == reqwest::StatusCode::UNAUTHORIZED || code == INVALID_ACCESS_TOKEN_CODE) {
                warn!(app_id = %self.app_id, "tenant token rejected, refreshing");
                self.invalidate_token().await;
                token = self.tenant_token().await?;
                retried = true;
                continue;
            }
            if !status.is_success() {
                return Err(Error::message(format!(
                    "api request failed: status={status}, body={envelope}"
                )));
            }
            if code != 0 {
                return Err(Error::api(code, api_error_message(&envelope)));
            }
            return Ok(envelope.get("data").cloned().unwrap_or(Value::Null));
        }
    }

    /// Reply into the thread when a target message is known, otherwise
    /// create a new chat message.
    async fn send_content(
        &self,
        chat_id: &str,
        reply_to: Option<&str>,
        msg_type: &str,
        content: String,
    ) -> Result<()> {
        let (url, body) = match reply_to {
            Some(message_id) => (
                format!("{}/im/v1/messages/{message_id}/reply", self.api_base),
                json!({ "msg_type": msg_type, "content": content }),
            ),
            None => (
                format!("{}/im/v1/messages?receive_id_type=chat_id", self.api_base),
                json!({ "receive_id": chat_id, "msg_type": msg_type, "content": content }),
            ),
        };
        self.request_api(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }
}

fn api_error_message(envelope: &Value) -> String {
    envelope
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_owned()
}

/// Interactive card body: one markdown element, mentions rendered as
/// at-tags at the head of the content.
fn card_content(markdown: &str, mentions: &[MentionTarget]) -> Result<String> {
    let card = json!({
        "config": { "wide_screen_mode": true },
        "elements": [
            { "tag": "markdown", "content": prepend_mentions(markdown, mentions) }
        ],
    });
    Ok(serde_json::to_string(&card)?)
}

fn text_content(text: &str, mentions: &[MentionTarget]) -> Result<String> {
    Ok(serde_json::to_string(&json!({
        "text": prepend_mentions(text, mentions)
    }))?)
}

#[async_trait]
impl ReplySender for FeishuClient {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
        mentions: &[MentionTarget],
        message_type: MessageType,
    ) -> Result<()> {
        let content = match message_type {
            MessageType::Post => encode_post(text, mentions)?,
            MessageType::Text => text_content(text, mentions)?,
        };
        self.send_content(chat_id, reply_to, message_type.as_str(), content)
            .await
    }

    async fn send_card(
        &self,
        chat_id: &str,
        markdown: &str,
        reply_to: Option<&str>,
        mentions: &[MentionTarget],
    ) -> Result<()> {
        let content = card_content(markdown, mentions)?;
        self.send_content(chat_id, reply_to, "interactive", content)
            .await
    }

    async fn add_reaction(&self, message_id: &str) -> Result<TypingIndicatorState> {
        let url = format!("{}/im/v1/messages/{message_id}/reactions", self.api_base);
        let body = json!({ "reaction_type": { "emoji_type": self.typing_emoji } });
        let data = self.request_api(Method::POST, &url, Some(&body)).await?;
        let reaction_id = data
            .get("reaction_id")
            .and_then(Value::as_str)
            .context("missing reaction_id in response")?
            .to_owned();
        Ok(TypingIndicatorState {
            message_id: message_id.to_owned(),
            reaction_id,
        })
    }

    async fn remove_reaction(&self, state: &TypingIndicatorState) -> Result<()> {
        let url = format!(
            "{}/im/v1/messages/{}/reactions/{}",
            self.api_base, state.message_id, state.reaction_id
        );
        self.request_api(Method::DELETE, &url, None).await?;
        Ok(())
    }
}
