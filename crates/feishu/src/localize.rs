//! Localization of machine-generated tool status headers.
//!
//! Only the first line of a tool message is rewritten; everything after it
//! passes through untouched. Labels resolve against a static dictionary
//! keyed by trimmed, lowercased tool identifier.

use {
    regex::Regex,
    std::{
        collections::HashMap,
        sync::LazyLock,
    },
};

/// Marker a localized present-progressive phrase starts with. A label that
/// already carries it is left alone so repeated localization is a no-op.
const IN_PROGRESS_MARKER: &str = "正在";

static TOOL_LABEL_TRANSLATIONS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("exec", "正在执行"),
            ("process", "正在处理进程"),
            ("apply_patch", "正在应用补丁"),
            ("read", "正在读取"),
            ("edit", "正在编辑"),
            ("write", "正在写入"),
            ("image", "正在识别"),
            ("search", "正在搜索"),
            ("fetch", "正在获取"),
            ("web", "正在浏览"),
            ("browser", "正在浏览"),
            ("canvas", "正在绘制"),
            ("nodes", "正在查询节点"),
            ("cron", "正在处理定时任务"),
            ("message", "正在发送消息"),
            ("tts", "正在合成语音"),
            ("gateway", "正在调用网关"),
            ("agents_list", "正在列出代理"),
            ("agents list", "正在列出代理"),
            ("sessions_list", "正在列出会话"),
            ("sessions list", "正在列出会话"),
            ("sessions_history", "正在读取会话历史"),
            ("sessions history", "正在读取会话历史"),
            ("sessions_send", "正在发送会话消息"),
            ("sessions send", "正在发送会话消息"),
            ("sessions_spawn", "正在创建会话"),
            ("sessions spawn", "正在创建会话"),
            ("session_status", "正在获取会话状态"),
            ("session status", "正在获取会话状态"),
            ("web_search", "正在搜索网页"),
            ("web search", "正在搜索网页"),
            ("web_fetch", "正在抓取网页"),
            ("web fetch", "正在抓取网页"),
            ("memory_search", "正在检索记忆"),
            ("memory search", "正在检索记忆"),
            ("memory_get", "正在读取记忆"),
            ("memory get", "正在读取记忆"),
            ("whatsapp_login", "正在登录 WhatsApp"),
            ("whatsapp login", "正在登录 WhatsApp"),
            ("whatsapp", "正在操作 WhatsApp"),
            ("discord", "正在操作 Discord"),
            ("slack", "正在操作 Slack"),
            ("telegram", "正在操作 Telegram"),
            ("download", "正在下载"),
            ("upload", "正在上传"),
            ("feishu doc", "正在操作飞书文档"),
            ("feishu_doc", "正在操作飞书文档"),
            ("feishu drive", "正在操作飞书云盘"),
            ("feishu_drive", "正在操作飞书云盘"),
            ("feishu wiki", "正在操作飞书知识库"),
            ("feishu_wiki", "正在操作飞书知识库"),
            ("feishu perm", "正在处理权限"),
            ("feishu_perm", "正在处理权限"),
            ("feishu scopes", "正在检查权限范围"),
            ("feishu_scopes", "正在检查权限范围"),
            ("feishu app scopes", "正在检查权限范围"),
            ("feishu_app_scopes", "正在检查权限范围"),
        ])
    });

#[allow(clippy::expect_used)]
static EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Extended_Pictographic}").expect("static pattern"));

// Label capture is lazy so the FIRST colon splits label from remainder.
#[allow(clippy::expect_used)]
static EMOJI_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+([^:]+?)(:.*)?$").expect("static pattern"));

#[allow(clippy::expect_used)]
static PLAIN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+?)(:.*)?$").expect("static pattern"));

/// Localize a single tool label. Unknown labels get the generic
/// "using tool" phrase; already-localized labels are returned unchanged.
#[must_use]
pub fn localize_tool_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return label.to_owned();
    }
    if let Some(mapped) = TOOL_LABEL_TRANSLATIONS.get(trimmed.to_lowercase().as_str()) {
        return (*mapped).to_owned();
    }
    if trimmed.starts_with(IN_PROGRESS_MARKER) {
        return trimmed.to_owned();
    }
    format!("正在使用工具 {trimmed}")
}

/// Rewrite the header line of a tool status message into a localized phrase.
///
/// Two header shapes are tried in order: an emoji-prefixed
/// `EMOJI LABEL[: rest]` and a bare `LABEL[: rest]`. The bare shape only
/// rewrites when the dictionary actually changes the label, so ordinary
/// prose is untouched.
#[must_use]
pub fn localize_tool_message(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(&header) = lines.first() else {
        return text.to_owned();
    };
    if header.is_empty() {
        return text.to_owned();
    }

    if let Some(caps) = EMOJI_HEADER.captures(header) {
        let leading = &caps[1];
        if EMOJI.is_match(leading) {
            let rest = caps.get(3).map_or("", |m| m.as_str());
            let mut out = format!("{leading} {}{rest}", localize_tool_label(&caps[2]));
            for line in &lines[1..] {
                out.push('\n');
                out.push_str(line);
            }
            return out;
        }
    }

    let Some(caps) = PLAIN_HEADER.captures(header) else {
        return text.to_owned();
    };
    let label = &caps[1];
    let localized = localize_tool_label(label);
    if localized == label {
        return text.to_owned();
    }
    let rest = caps.get(2).map_or("", |m| m.as_str());
    let mut out = format!("{localized}{rest}");
    for line in &lines[1..] {
        out.push('\n');
        out.push_str(line);
    }
    out
}
