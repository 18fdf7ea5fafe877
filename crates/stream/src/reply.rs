//! The outward readable side of a switchable stream.
//!
//! [`ReplyStream`] implements [`futures::Stream`] so consumers can use the
//! usual async combinators. Source swaps on the multiplexer side are
//! invisible here: the stream yields chunks until the multiplexer closes it
//! (clean end) or is dropped (abnormal end).

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

/// A single uninterrupted stream of text chunks.
pub struct ReplyStream {
    rx: mpsc::Receiver<String>,
    clean_close: Arc<AtomicBool>,
    ended: bool,
}

impl ReplyStream {
    pub(crate) fn new(rx: mpsc::Receiver<String>, clean_close: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            clean_close,
            ended: false,
        }
    }

    /// Whether the stream ended via an explicit `close()`.
    ///
    /// Reports false until the stream has actually ended, and false forever
    /// if the producing side went away without closing.
    pub fn finished_cleanly(&self) -> bool {
        self.ended && self.clean_close.load(Ordering::SeqCst)
    }

    /// Drain the stream and return everything it produced.
    ///
    /// Convenience for callers that do not need incremental chunks.
    pub async fn collect(mut self) -> CollectedReply {
        use futures::StreamExt;

        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk);
        }
        CollectedReply {
            text,
            finished_cleanly: self.finished_cleanly(),
        }
    }
}

impl Stream for ReplyStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(chunk)),
            Poll::Ready(None) => {
                this.ended = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("ended", &self.ended)
            .field("clean_close", &self.clean_close.load(Ordering::SeqCst))
            .finish()
    }
}

/// Everything a drained [`ReplyStream`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedReply {
    /// All chunks concatenated in arrival order.
    pub text: String,
    /// Whether the stream ended via an explicit close.
    pub finished_cleanly: bool,
}
