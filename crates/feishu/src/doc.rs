//! Request model for the Feishu document tool.
//!
//! A pure I/O contract: the host tool runtime deserializes agent-produced
//! JSON into [`DocRequest`] and routes it to the document API. No logic
//! lives here beyond the serde shape.

use serde::{Deserialize, Serialize};

/// How an editor id in a `create` request should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberIdType {
    Openid,
    Userid,
}

/// One document tool invocation, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DocRequest {
    /// Read a document's content as markdown.
    Read { doc_token: String },
    /// Replace the entire document content.
    Write { doc_token: String, content: String },
    /// Append markdown to the end of the document.
    Append { doc_token: String, content: String },
    /// Create a new document, optionally granting edit access.
    Create {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_token: Option<String>,
        /// Sender open id from context; grants edit permission when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_open_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        editor_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        editor_id_type: Option<MemberIdType>,
    },
    ListBlocks { doc_token: String },
    GetBlock { doc_token: String, block_id: String },
    UpdateBlock {
        doc_token: String,
        block_id: String,
        content: String,
    },
    DeleteBlock { doc_token: String, block_id: String },
}
