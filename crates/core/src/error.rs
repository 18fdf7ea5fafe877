//! Error types for the segue domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all segue operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Stream errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Continuation policy ---
    #[error("Maximum continuation segments exceeded (limit: {max})")]
    SegmentsExhausted { max: u32 },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse outcome classes for boundary layers that map errors to a status
/// without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential failure (401-class).
    Unauthorized,
    /// Rate limit hit (429-class).
    TooManyRequests,
    /// The continuation segment bound was exhausted.
    SegmentsExhausted,
    /// Any other backend-side failure.
    Upstream,
    /// A fault in this process (contract violation, task failure).
    Internal,
}

impl Error {
    /// Classify this error for an outward-facing boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Backend(BackendError::AuthenticationFailed(_)) => ErrorKind::Unauthorized,
            Error::Backend(BackendError::RateLimited { .. }) => ErrorKind::TooManyRequests,
            Error::Backend(_) => ErrorKind::Upstream,
            Error::SegmentsExhausted { .. } => ErrorKind::SegmentsExhausted,
            Error::Stream(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited by backend: {message}")]
    RateLimited { message: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("Backend request failed: {0}")]
    Other(String),
}

impl BackendError {
    /// Build a backend error from a raw failure message.
    ///
    /// Backends rarely expose a structured failure taxonomy, so the message
    /// itself is sniffed: "api key" marks a credential failure and
    /// "rate limit" a throttling failure. The original message is preserved
    /// verbatim in every variant.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("api key") {
            BackendError::AuthenticationFailed(message)
        } else if lower.contains("rate limit") {
            BackendError::RateLimited { message }
        } else {
            BackendError::Other(message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Attach or close was called after the outward stream was closed.
    #[error("Stream already closed")]
    AlreadyClosed,
}
