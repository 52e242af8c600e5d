use serde::{Deserialize, Serialize};

/// Category tag attached to each generated reply by the upstream agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Regular assistant answer text.
    Assistant,
    /// Machine-generated tool activity status line.
    Tool,
    /// Error text surfaced to the chat.
    Error,
}

impl ReplyKind {
    /// Stable tag used in log fields and failure reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn is_tool(self) -> bool {
        matches!(self, Self::Tool)
    }
}

impl std::fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated reply, produced upstream and consumed once by a channel
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub text: String,
    pub kind: ReplyKind,
}

impl ReplyPayload {
    #[must_use]
    pub fn new(text: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// A user to notify in an outgoing reply. Mention list order is preserved
/// end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionTarget {
    /// Platform user id (open id on Feishu/Lark).
    pub id: String,
    /// Display name rendered next to the mention.
    pub name: String,
}

impl MentionTarget {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
