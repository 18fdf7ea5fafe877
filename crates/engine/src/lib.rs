//! # Segue Engine
//!
//! The continuation orchestrator. Takes a conversation, runs it against a
//! [`Backend`](segue_core::Backend), and hides token-budget truncation from
//! the consumer: when a reply segment is cut off, the engine re-calls the
//! backend with the accumulated text and splices the next segment onto the
//! same outward stream, up to a configured bound.
//!
//! Also home to the boundary helpers an embedding server needs: directive
//! extraction from user turns and API key recovery from cookie headers.

pub mod credentials;
pub mod directives;
pub mod relay;

pub use credentials::{api_keys_from_cookies, parse_cookie_header};
pub use directives::RegexDirectiveParser;
pub use relay::{ContinuationEngine, OutcomeHandle, RelayId, RelayOutcome, Reply};
