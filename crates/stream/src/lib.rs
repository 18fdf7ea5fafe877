//! # Segue Stream
//!
//! The stream multiplexer: one stable outward text stream whose upstream
//! source can be swapped any number of times, with no chunk lost, duplicated,
//! or reordered across swaps. The consumer cannot tell a swap happened.
//!
//! The writing side is [`SwitchableStream`]; the reading side is
//! [`ReplyStream`]. The outward stream never ends on its own — only an
//! explicit [`SwitchableStream::close`] (clean) or dropping the multiplexer
//! (abnormal) ends it, and [`ReplyStream::finished_cleanly`] tells the two
//! apart.

pub mod reply;
pub mod switchable;

// Re-export key types at crate root for ergonomics
pub use reply::{CollectedReply, ReplyStream};
pub use switchable::{SegmentEnd, StreamState, SwitchableStream};
