//! The continuation relay engine.
//!
//! One `run` produces one outward stream. The engine normalizes the incoming
//! conversation, issues the first backend call, and then drives a bounded
//! continuation loop: whenever a segment ends because the token budget was
//! hit, the segment's text and a fixed continuation request are appended to
//! the conversation and the next backend call is spliced onto the same
//! outward stream. The consumer never sees the seam.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use segue_config::AppConfig;
use segue_core::backend::{Backend, BackendRequest, FinishReason, ReplyHandle};
use segue_core::directive::DirectiveParser;
use segue_core::error::{BackendError, Error};
use segue_core::turn::Turn;
use segue_stream::{ReplyStream, SegmentEnd, SwitchableStream};

use crate::directives::{self, RegexDirectiveParser, ResolvedTarget};

/// Unique identifier for one relay run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayId(pub String);

impl RelayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RelayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a finished relay run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The final segment finished naturally and the stream was closed.
    Completed {
        /// Backend calls issued (continuation swaps + 1).
        segments: u32,
        /// All segment texts concatenated.
        text: String,
    },
    /// The consumer stopped reading and the run was abandoned mid-segment.
    Abandoned {
        /// Backend calls issued before the consumer left.
        segments: u32,
    },
}

/// A live relay run.
///
/// `stream` is the continuous outward stream; `outcome` resolves once the
/// drive task is done and reports how the run ended. An error outcome means
/// the stream ended abnormally (no close was observed).
#[derive(Debug)]
pub struct Reply {
    /// Identifier correlating logs for this run.
    pub id: RelayId,

    /// The continuous outward stream.
    pub stream: ReplyStream,

    /// Awaitable final outcome of the drive task.
    pub outcome: OutcomeHandle,
}

/// The awaitable side of a [`Reply`].
#[derive(Debug)]
pub struct OutcomeHandle {
    task: JoinHandle<Result<RelayOutcome, Error>>,
}

impl OutcomeHandle {
    /// Wait for the drive task and report how the run ended.
    pub async fn join(self) -> Result<RelayOutcome, Error> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::Internal(format!("relay drive task failed: {e}"))),
        }
    }
}

/// The orchestrator that turns backend calls into one seamless stream.
pub struct ContinuationEngine {
    /// The backend every segment call goes to
    backend: Arc<dyn Backend>,

    /// Directive syntax used during normalization
    directives: Arc<dyn DirectiveParser>,

    /// Model used when no directive selects one
    default_model: String,

    /// Provider used when no directive selects one
    default_provider: String,

    /// Token budget for models without a table entry
    default_max_tokens: u32,

    /// Continuation swaps allowed per run (zero forbids continuation)
    max_segments: u32,

    /// The user turn appended when continuing a truncated segment
    continue_prompt: String,

    /// Outward channel capacity in chunks
    stream_buffer: usize,

    /// Known models and their optional per-model budgets
    budgets: HashMap<String, Option<u32>>,
}

impl ContinuationEngine {
    /// Create an engine from loaded configuration.
    pub fn new(backend: Arc<dyn Backend>, config: &AppConfig) -> Self {
        let budgets = config
            .models
            .iter()
            .map(|m| (m.name.clone(), m.max_tokens))
            .collect();
        Self {
            backend,
            directives: Arc::new(RegexDirectiveParser::new()),
            default_model: config.default_model.clone(),
            default_provider: config.default_provider.clone(),
            default_max_tokens: config.default_max_tokens,
            max_segments: config.max_segments,
            continue_prompt: config.continue_prompt.clone(),
            stream_buffer: config.stream_buffer,
            budgets,
        }
    }

    /// Replace the directive syntax.
    pub fn with_directive_parser(mut self, parser: Arc<dyn DirectiveParser>) -> Self {
        self.directives = parser;
        self
    }

    /// Resolve the token budget for `model`.
    fn budget_for(&self, model: &str) -> u32 {
        self.budgets
            .get(model)
            .copied()
            .flatten()
            .unwrap_or(self.default_max_tokens)
    }

    /// Start one relay run.
    ///
    /// Normalizes the conversation, issues the first backend call, and spawns
    /// the drive task that owns the multiplexer from then on. A first-call
    /// failure surfaces here, before anything has streamed; later failures
    /// travel through the returned outcome handle and leave the stream
    /// abnormally ended.
    pub async fn run(
        &self,
        turns: Vec<Turn>,
        api_keys: HashMap<String, String>,
    ) -> Result<Reply, Error> {
        let id = RelayId::new();

        // ── Normalize the conversation ──
        let (turns, target) = directives::normalize(
            turns,
            self.directives.as_ref(),
            &self.default_model,
            &self.default_provider,
            &self.budgets,
        );
        let max_tokens = self.budget_for(&target.model);

        info!(
            relay_id = %id,
            model = %target.model,
            provider = %target.provider,
            max_tokens,
            turns = turns.len(),
            "Starting relay run"
        );

        let (mux, stream) = SwitchableStream::channel(self.stream_buffer);
        let drive = Drive {
            id: id.clone(),
            backend: Arc::clone(&self.backend),
            turns,
            target,
            max_tokens,
            api_keys,
            max_segments: self.max_segments,
            continue_prompt: self.continue_prompt.clone(),
            mux,
        };

        // ── First backend call ──
        let first = drive.backend.stream_chat(drive.request()).await?;

        let task = tokio::spawn(drive.run(first));

        Ok(Reply {
            id,
            stream,
            outcome: OutcomeHandle { task },
        })
    }
}

/// Everything the spawned drive task owns for one run.
struct Drive {
    id: RelayId,
    backend: Arc<dyn Backend>,
    turns: Vec<Turn>,
    target: ResolvedTarget,
    max_tokens: u32,
    api_keys: HashMap<String, String>,
    max_segments: u32,
    continue_prompt: String,
    mux: SwitchableStream,
}

impl Drive {
    fn request(&self) -> BackendRequest {
        BackendRequest {
            turns: self.turns.clone(),
            model: self.target.model.clone(),
            provider: self.target.provider.clone(),
            max_tokens: self.max_tokens,
            api_keys: self.api_keys.clone(),
        }
    }

    /// Forward segments until one finishes for a reason other than the token
    /// budget, the swap bound is exhausted, or the consumer goes away.
    async fn run(mut self, mut handle: ReplyHandle) -> Result<RelayOutcome, Error> {
        let mut assembled = String::new();

        loop {
            let end = self.mux.attach(handle.chunks).await?;
            // attach() bumps the switch counter on entry, so switches() + 1
            // is the ordinal of the segment that just ended.
            let segment = self.mux.switches() + 1;

            match end {
                SegmentEnd::ConsumerGone => {
                    debug!(relay_id = %self.id, segment, "Consumer disconnected, abandoning run");
                    return Ok(RelayOutcome::Abandoned { segments: segment });
                }
                SegmentEnd::Drained => {}
            }

            // ── Completion signal ──
            let completion = match handle.completion.await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(BackendError::Interrupted(
                        "backend dropped the completion channel".into(),
                    )
                    .into());
                }
            };
            assembled.push_str(&completion.text);

            if completion.reason != FinishReason::Length {
                debug!(
                    relay_id = %self.id,
                    segment,
                    reason = %completion.reason,
                    "Reply finished, closing stream"
                );
                self.mux.close()?;
                return Ok(RelayOutcome::Completed {
                    segments: segment,
                    text: assembled,
                });
            }

            // Length-truncated. The bound is checked before anything else
            // happens; exhausting it ends the stream without a close.
            if self.mux.switches() >= self.max_segments {
                warn!(
                    relay_id = %self.id,
                    max = self.max_segments,
                    "Continuation bound exhausted, ending stream abnormally"
                );
                return Err(Error::SegmentsExhausted {
                    max: self.max_segments,
                });
            }

            // A consumer that left while the segment was buffered would only
            // surface on the next send. Checking here spares the backend call.
            if self.mux.is_consumer_gone() {
                debug!(
                    relay_id = %self.id,
                    segment,
                    "Consumer disconnected, skipping continuation"
                );
                return Ok(RelayOutcome::Abandoned { segments: segment });
            }

            let switches_left = self.max_segments - self.mux.switches();
            info!(
                relay_id = %self.id,
                max_tokens = self.max_tokens,
                switches_left,
                "Reached max token limit, continuing message"
            );

            self.turns.push(Turn::assistant(completion.text));
            self.turns.push(Turn::user(self.continue_prompt.clone()));

            handle = self.backend.stream_chat(self.request()).await?;
        }
    }
}
