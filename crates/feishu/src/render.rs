//! Render-mode selection for outgoing replies.

use {regex::Regex, std::sync::LazyLock};

use crate::config::RenderMode;

// Fenced code block, non-greedy, may span lines.
#[allow(clippy::expect_used)]
static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("static pattern"));

// Markdown table: a pipe-delimited row followed by a separator row.
#[allow(clippy::expect_used)]
static MARKDOWN_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|.+\|[\r\n]+\|[-:| ]+\|").expect("static pattern"));

// Self-referential link to the channel's own domains. Post bodies render
// those links as unfurled previews, which we avoid by dropping to plain text.
#[allow(clippy::expect_used)]
static SELF_DOMAIN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:[a-z0-9-]+\.)?(?:feishu\.cn|larksuite\.com|lark\.com)(?:/|$)")
        .expect("static pattern")
});

/// Whether text contains markdown that benefits from card rendering.
#[must_use]
pub fn should_use_card(text: &str) -> bool {
    FENCED_CODE.is_match(text) || MARKDOWN_TABLE.is_match(text)
}

/// Whether text links back to the channel's own domain.
#[must_use]
pub fn contains_feishu_domain_link(text: &str) -> bool {
    SELF_DOMAIN_LINK.is_match(text)
}

/// How one reply should be rendered. Neither flag set means plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderDecision {
    pub use_card: bool,
    pub use_post: bool,
}

/// Resolve the render decision for a reply. Unrecognized configured modes
/// match none of the arms below and fall through to plain text.
#[must_use]
pub fn select_render_mode(mode: &RenderMode, text: &str) -> RenderDecision {
    let use_card = *mode == RenderMode::Card
        || (*mode == RenderMode::Auto && should_use_card(text));
    let use_post = *mode == RenderMode::Post && !contains_feishu_domain_link(text);
    RenderDecision { use_card, use_post }
}
