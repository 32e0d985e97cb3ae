use serde::{Deserialize, Serialize};

/// Message role (§3 data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// A single tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// An attachment reference. Attachments point at §4.C blob keys; they never
/// carry the bytes inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub blob_key: String,
    pub content_type: String,
    pub size: u64,
}

/// Per-message token usage, recorded when known (assistant turns only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// A single conversation turn (§3 `Message`).
///
/// Invariant T1/T2 (tool-call pairing) is not enforced by this type itself —
/// it is a plain data carrier. `occ-pipeline`'s message preparation stage is
/// the sole place that enforces pairing before anything is sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    /// May be empty when `role == Assistant` and `tool_calls` is non-empty.
    pub content: String,
    pub created_at: String,
    /// Required iff `role == Tool`.
    pub tool_call_id: Option<String>,
    /// Present only on assistant messages that invoked tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Message {
    pub fn user(session_id: impl Into<String>, id: impl Into<String>, content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role: Role::User,
            content: content.into(),
            created_at: created_at.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
            attachments: Vec::new(),
            usage: None,
        }
    }

    pub fn assistant_text(session_id: impl Into<String>, id: impl Into<String>, content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role: Role::Assistant,
            content: content.into(),
            created_at: created_at.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
            attachments: Vec::new(),
            usage: None,
        }
    }

    pub fn assistant_tool_calls(
        session_id: impl Into<String>,
        id: impl Into<String>,
        created_at: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role: Role::Assistant,
            content: String::new(),
            created_at: created_at.into(),
            tool_call_id: None,
            tool_calls,
            attachments: Vec::new(),
            usage: None,
        }
    }

    pub fn tool_response(
        session_id: impl Into<String>,
        id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role: Role::Tool,
            content: content.into(),
            created_at: created_at.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
            attachments: Vec::new(),
            usage: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }
}
