use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Which deployment of the open platform an account talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeishuPlatform {
    /// Mainland deployment (open.feishu.cn).
    #[default]
    Feishu,
    /// International deployment (open.larksuite.com).
    Lark,
}

impl FeishuPlatform {
    #[must_use]
    pub fn api_base(self) -> &'static str {
        match self {
            Self::Feishu => "https://open.feishu.cn/open-apis",
            Self::Lark => "https://open.larksuite.com/open-apis",
        }
    }
}

/// How outgoing replies are rendered in the destination chat.
///
/// Unknown mode strings are kept, not rejected: existing deployments may
/// carry values this build does not know, and those fall through to the
/// plain-text path at render time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Rich text ("post") message bodies.
    #[default]
    Post,
    /// Card for code blocks and tables, plain text otherwise.
    Auto,
    /// Plain text always.
    Raw,
    /// Interactive card always.
    Card,
    #[serde(untagged)]
    Other(String),
}

/// How text is split into transport-safe chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    /// Prefer newline, then space, else cut at a char boundary.
    #[default]
    Boundary,
    /// Fixed-size cuts at char boundaries.
    Hard,
}

/// How markdown tables are converted for non-card rendering paths.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// Width-aligned plain-text grid.
    #[default]
    Aligned,
    /// One "Header: value" list per row.
    List,
}

/// Treatment of machine-generated tool status messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolMessageConfig {
    /// Drop "process: poll" summaries before delivery.
    pub suppress_process_poll: bool,
}

impl Default for ToolMessageConfig {
    fn default() -> Self {
        Self {
            suppress_process_poll: true,
        }
    }
}

/// Per-account toggles for the Feishu document tool family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeishuToolsConfig {
    pub doc: bool,
    pub wiki: bool,
    pub drive: bool,
    pub perm: bool,
    pub scopes: bool,
}

impl Default for FeishuToolsConfig {
    fn default() -> Self {
        Self {
            doc: true,
            wiki: true,
            drive: true,
            perm: true,
            scopes: true,
        }
    }
}

/// Configuration for a single Feishu/Lark bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuAccountConfig {
    /// App ID from the open platform developer console.
    pub app_id: String,

    /// App secret paired with `app_id`.
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,

    /// Which open platform deployment to talk to.
    pub platform: FeishuPlatform,

    /// Override the API base URL (self-hosted gateways, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// The bot's own open id, used to detect at-mentions addressed to it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_open_id: Option<String>,

    /// How outgoing replies are rendered.
    pub render_mode: RenderMode,

    /// Tool status message treatment.
    pub tool_messages: ToolMessageConfig,

    /// Maximum bytes per outgoing chunk.
    pub text_chunk_limit: usize,

    /// How text is split into chunks.
    pub chunk_mode: ChunkMode,

    /// How markdown tables are converted outside card mode.
    pub table_mode: TableMode,

    /// Emoji key used as the typing-indicator reaction.
    pub typing_emoji: String,

    /// Document tool toggles.
    pub tools: FeishuToolsConfig,
}

impl std::fmt::Debug for FeishuAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuAccountConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("platform", &self.platform)
            .field("render_mode", &self.render_mode)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for FeishuAccountConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: Secret::new(String::new()),
            platform: FeishuPlatform::default(),
            api_base: None,
            bot_open_id: None,
            render_mode: RenderMode::default(),
            tool_messages: ToolMessageConfig::default(),
            text_chunk_limit: 4000,
            chunk_mode: ChunkMode::default(),
            table_mode: TableMode::default(),
            typing_emoji: "Typing".into(),
            tools: FeishuToolsConfig::default(),
        }
    }
}
