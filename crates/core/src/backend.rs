//! Backend trait — the abstraction over streaming model calls.
//!
//! A Backend takes a conversation and produces one streamed reply: a channel
//! of text chunks followed by a single completion signal that says how the
//! reply ended. The engine consumes this trait without knowing what sits
//! behind it, and segment continuation is just another `stream_chat` call
//! with an extended conversation.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::BackendError;
use crate::turn::Turn;

/// How a backend reply ended.
///
/// A closed set: the engine branches on `Length` (continue) versus everything
/// else (finish), and `Other` carries any backend-specific tag verbatim so it
/// is never silently collapsed into a known reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The model stopped on its own.
    Stop,
    /// Generation was cut off at the token budget.
    Length,
    /// Any other backend-specific reason (content filter, tool use, ...).
    Other(String),
}

impl FinishReason {
    /// Map a raw finish tag to a reason.
    ///
    /// Only the two tags the engine acts on are recognized; adapters that
    /// speak a different vocabulary translate before calling this.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// The completion signal delivered once per backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The full text of this reply segment.
    pub text: String,

    /// How the segment ended.
    pub reason: FinishReason,
}

/// One streaming chat request.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    /// The conversation so far
    pub turns: Vec<Turn>,

    /// The model to use (e.g., "claude-3-5-sonnet-latest")
    pub model: String,

    /// Which provider the model belongs to (e.g., "anthropic")
    pub provider: String,

    /// Token budget for this call
    pub max_tokens: u32,

    /// Per-provider API keys, threaded explicitly rather than read from
    /// ambient state. Never serialized.
    #[serde(skip)]
    pub api_keys: HashMap<String, String>,
}

// Keys must not leak into logs, so Debug shows only how many there are.
impl fmt::Debug for BackendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRequest")
            .field("turns", &self.turns.len())
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("max_tokens", &self.max_tokens)
            .field("api_keys", &format!("<{} redacted>", self.api_keys.len()))
            .finish()
    }
}

/// The two-channel handle a backend returns for one call.
///
/// Contract: the backend drops the chunk sender when the reply text is done,
/// and resolves `completion` only after that. A completion sender dropped
/// without sending means the call died mid-stream and maps to
/// [`BackendError::Interrupted`].
#[derive(Debug)]
pub struct ReplyHandle {
    /// In-order text chunks of this reply segment.
    pub chunks: mpsc::Receiver<String>,

    /// Resolves once the segment is finished (or failed).
    pub completion: oneshot::Receiver<Result<Completion, BackendError>>,
}

/// The backend capability consumed by the engine.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (e.g., "anthropic", "scripted").
    fn name(&self) -> &str;

    /// Issue one streaming chat call.
    ///
    /// An error here means nothing was streamed; failures after streaming
    /// begins travel through the handle's completion channel instead.
    async fn stream_chat(
        &self,
        request: BackendRequest,
    ) -> std::result::Result<ReplyHandle, BackendError>;
}
