//! The switchable multiplexer side of an outward stream.
//!
//! A [`SwitchableStream`] owns the writing end of one outward text stream.
//! Sources (per-segment chunk receivers) are attached one at a time and
//! forwarded to exhaustion; the consumer reading the paired [`ReplyStream`]
//! sees a single uninterrupted stream across any number of swaps. The outward
//! stream only ends when `close()` is called or the multiplexer is dropped,
//! and the two are distinguishable on the consumer side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use segue_core::StreamError;

use crate::reply::ReplyStream;

/// Where the multiplexer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, no source attached yet.
    Empty,
    /// At least one source has been attached; the outward stream is live.
    Forwarding,
    /// `close()` was called; no further operation is valid.
    Closed,
}

/// How one attached segment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEnd {
    /// The source ran dry; the outward stream stays open for the next one.
    Drained,
    /// The outward receiver was dropped mid-segment.
    ConsumerGone,
}

/// The multiplexer half of an outward stream pair.
///
/// `attach` runs each segment to exhaustion while holding `&mut self`, so a
/// second source can never be forwarded while one is still active — segment
/// ordering is enforced by the borrow checker rather than a runtime check.
/// Only the post-`close()` misuse remains a runtime error.
#[derive(Debug)]
pub struct SwitchableStream {
    outward: Option<mpsc::Sender<String>>,
    attached: bool,
    switches: u32,
    clean_close: Arc<AtomicBool>,
}

impl SwitchableStream {
    /// Create a multiplexer and its paired outward stream.
    ///
    /// `capacity` bounds how far forwarding can run ahead of the consumer.
    pub fn channel(capacity: usize) -> (Self, ReplyStream) {
        let (tx, rx) = mpsc::channel(capacity);
        let clean_close = Arc::new(AtomicBool::new(false));
        let stream = ReplyStream::new(rx, Arc::clone(&clean_close));
        let mux = Self {
            outward: Some(tx),
            attached: false,
            switches: 0,
            clean_close,
        };
        (mux, stream)
    }

    /// Attach `source` and forward every chunk it produces, in order.
    ///
    /// Returns once the source is exhausted ([`SegmentEnd::Drained`]) or the
    /// outward receiver has gone away ([`SegmentEnd::ConsumerGone`]). Chunks
    /// already forwarded are never lost: they sit in the outward channel until
    /// the consumer reads them. May be called again after a previous source
    /// finished; every attachment after the first bumps the switch counter.
    pub async fn attach(
        &mut self,
        mut source: mpsc::Receiver<String>,
    ) -> Result<SegmentEnd, StreamError> {
        let outward = match &self.outward {
            Some(tx) => tx.clone(),
            None => return Err(StreamError::AlreadyClosed),
        };
        if self.attached {
            self.switches += 1;
        } else {
            self.attached = true;
        }
        let segment = self.switches;

        while let Some(chunk) = source.recv().await {
            if outward.send(chunk).await.is_err() {
                debug!(segment, "outward receiver dropped, abandoning segment");
                return Ok(SegmentEnd::ConsumerGone);
            }
        }
        debug!(segment, "segment source drained");
        Ok(SegmentEnd::Drained)
    }

    /// Mark the outward stream finished.
    ///
    /// Everything already forwarded is still delivered; the consumer sees
    /// end-of-stream after draining and `finished_cleanly()` reports true.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.outward.is_none() {
            return Err(StreamError::AlreadyClosed);
        }
        self.clean_close.store(true, Ordering::SeqCst);
        self.outward = None;
        debug!(switches = self.switches, "outward stream closed");
        Ok(())
    }

    /// How many times the source has been swapped (attachments after the
    /// first).
    pub fn switches(&self) -> u32 {
        self.switches
    }

    /// Whether the outward receiver has been dropped.
    ///
    /// A consumer that leaves between segments only surfaces when the next
    /// send fails; this observes it without sending. Also true after
    /// `close()`, since nothing can be forwarded either way.
    pub fn is_consumer_gone(&self) -> bool {
        self.outward.as_ref().is_none_or(|tx| tx.is_closed())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        if self.outward.is_none() {
            StreamState::Closed
        } else if self.attached {
            StreamState::Forwarding
        } else {
            StreamState::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn source_with(chunks: &[&str]) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            tx.send(chunk.to_string()).await.unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn forwards_one_segment_and_closes() {
        let (mut mux, stream) = SwitchableStream::channel(8);
        assert_eq!(mux.state(), StreamState::Empty);

        let source = source_with(&["hel", "lo"]).await;
        let end = mux.attach(source).await.unwrap();
        assert_eq!(end, SegmentEnd::Drained);
        assert_eq!(mux.state(), StreamState::Forwarding);

        mux.close().unwrap();
        assert_eq!(mux.state(), StreamState::Closed);

        let collected = stream.collect().await;
        assert_eq!(collected.text, "hello");
        assert!(collected.finished_cleanly);
    }

    #[tokio::test]
    async fn swapped_segments_arrive_in_order() {
        let (mut mux, stream) = SwitchableStream::channel(16);

        mux.attach(source_with(&["one ", "two "]).await).await.unwrap();
        mux.attach(source_with(&["three ", "four"]).await)
            .await
            .unwrap();
        mux.close().unwrap();

        let collected = stream.collect().await;
        assert_eq!(collected.text, "one two three four");
        assert!(collected.finished_cleanly);
    }

    #[tokio::test]
    async fn switch_counter_ignores_first_attachment() {
        let (mut mux, _stream) = SwitchableStream::channel(8);
        assert_eq!(mux.switches(), 0);

        mux.attach(source_with(&["a"]).await).await.unwrap();
        assert_eq!(mux.switches(), 0);

        mux.attach(source_with(&["b"]).await).await.unwrap();
        mux.attach(source_with(&["c"]).await).await.unwrap();
        assert_eq!(mux.switches(), 2);
    }

    #[tokio::test]
    async fn attach_after_close_fails() {
        let (mut mux, _stream) = SwitchableStream::channel(8);
        mux.close().unwrap();

        let err = mux.attach(source_with(&["x"]).await).await.unwrap_err();
        assert_eq!(err, StreamError::AlreadyClosed);
    }

    #[tokio::test]
    async fn close_twice_fails() {
        let (mut mux, _stream) = SwitchableStream::channel(8);
        mux.close().unwrap();
        assert_eq!(mux.close().unwrap_err(), StreamError::AlreadyClosed);
    }

    #[tokio::test]
    async fn buffered_chunks_survive_close() {
        // Close before the consumer reads anything; the buffer must drain.
        let (mut mux, stream) = SwitchableStream::channel(8);
        mux.attach(source_with(&["still ", "here"]).await)
            .await
            .unwrap();
        mux.close().unwrap();

        let collected = stream.collect().await;
        assert_eq!(collected.text, "still here");
        assert!(collected.finished_cleanly);
    }

    #[tokio::test]
    async fn dropped_consumer_ends_segment_early() {
        let (mut mux, stream) = SwitchableStream::channel(1);
        drop(stream);

        let end = mux.attach(source_with(&["a", "b", "c"]).await).await.unwrap();
        assert_eq!(end, SegmentEnd::ConsumerGone);
    }

    #[tokio::test]
    async fn consumer_gone_is_visible_without_sending() {
        let (mut mux, stream) = SwitchableStream::channel(8);
        mux.attach(source_with(&["a"]).await).await.unwrap();
        assert!(!mux.is_consumer_gone());

        drop(stream);
        assert!(mux.is_consumer_gone());
    }

    #[tokio::test]
    async fn closed_stream_reports_consumer_gone() {
        let (mut mux, _stream) = SwitchableStream::channel(8);
        mux.close().unwrap();
        assert!(mux.is_consumer_gone());
    }

    #[tokio::test]
    async fn drop_without_close_is_an_abnormal_end() {
        let (mut mux, stream) = SwitchableStream::channel(8);
        mux.attach(source_with(&["cut "]).await).await.unwrap();
        drop(mux);

        let collected = stream.collect().await;
        assert_eq!(collected.text, "cut ");
        assert!(!collected.finished_cleanly);
    }

    #[tokio::test]
    async fn close_from_empty_is_allowed() {
        let (mut mux, stream) = SwitchableStream::channel(8);
        mux.close().unwrap();

        let collected = stream.collect().await;
        assert_eq!(collected.text, "");
        assert!(collected.finished_cleanly);
    }
}
