//! # Segue Core
//!
//! Domain types, traits, and error definitions for the segue continuation
//! relay. This crate has **zero framework dependencies** — it defines the
//! domain model that the stream and engine crates implement against.
//!
//! ## Design Philosophy
//!
//! The seams of the system are traits defined here. Implementations live in
//! their respective crates. This enables:
//! - Swapping the backend and directive syntax via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod directive;
pub mod error;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use backend::{Backend, BackendRequest, Completion, FinishReason, ReplyHandle};
pub use directive::{Directive, DirectiveParser};
pub use error::{BackendError, Error, ErrorKind, Result, StreamError};
pub use turn::{Role, ToolInvocation, Turn};
