//! Conversation turns — the value objects a relay run operates on.
//!
//! A conversation is an ordered `Vec<Turn>` supplied by the caller. The engine
//! owns it for the duration of one run and only ever appends to it (assistant
//! text plus the continuation request when a segment is truncated).

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub role: Role,

    /// The text payload
    pub text: String,

    /// Records of prior tool calls, carried opaquely
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            tool_invocations: Vec::new(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_invocations: Vec::new(),
        }
    }
}

/// A completed tool call recorded on a turn.
///
/// The relay never interprets these; they ride along so the backend sees the
/// full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool that was invoked
    pub name: String,

    /// Arguments the tool was called with
    pub arguments: serde_json::Value,

    /// What the tool returned
    pub result: serde_json::Value,
}
