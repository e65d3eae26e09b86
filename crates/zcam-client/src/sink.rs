//! Frame consumers
//!
//! The reader task of a preview connection owns its sink, so a sink sees
//! frames strictly in stream order and never concurrently.

use tokio::sync::mpsc;
use tracing::warn;
use zcam_core::Frame;

/// Receives the frames of one preview connection
pub trait FrameSink: Send + 'static {
    /// A complete frame
    fn on_frame(&mut self, frame: Frame);

    /// The connection closed; no more frames will follow.
    ///
    /// `reason` is `None` for an orderly close by the device.
    fn on_closed(&mut self, reason: Option<String>) {
        let _ = reason;
    }
}

/// Everything a preview connection reports, as a single stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Frame(Frame),
    Closed { reason: Option<String> },
}

/// Unbounded event channel whose sender is a [`FrameSink`]
pub fn event_channel() -> (
    mpsc::UnboundedSender<StreamEvent>,
    mpsc::UnboundedReceiver<StreamEvent>,
) {
    mpsc::unbounded_channel()
}

impl FrameSink for mpsc::UnboundedSender<StreamEvent> {
    fn on_frame(&mut self, frame: Frame) {
        let _ = self.send(StreamEvent::Frame(frame));
    }

    fn on_closed(&mut self, reason: Option<String>) {
        let _ = self.send(StreamEvent::Closed { reason });
    }
}

/// Bounded channels drop frames the consumer has no room for
impl FrameSink for mpsc::Sender<StreamEvent> {
    fn on_frame(&mut self, frame: Frame) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.try_send(StreamEvent::Frame(frame)) {
            warn!("Frame consumer is full, dropping frame");
        }
    }

    fn on_closed(&mut self, reason: Option<String>) {
        if let Err(mpsc::error::TrySendError::Full(_)) =
            self.try_send(StreamEvent::Closed { reason })
        {
            warn!("Frame consumer is full, close event lost");
        }
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn on_frame(&mut self, frame: Frame) {
        (**self).on_frame(frame);
    }

    fn on_closed(&mut self, reason: Option<String>) {
        (**self).on_closed(reason);
    }
}

/// Sink calling a closure per frame
pub struct CallbackSink<F> {
    callback: F,
}

/// Wrap a closure as a [`FrameSink`]
pub fn from_fn<F>(callback: F) -> CallbackSink<F>
where
    F: FnMut(Frame) + Send + 'static,
{
    CallbackSink { callback }
}

impl<F> FrameSink for CallbackSink<F>
where
    F: FnMut(Frame) + Send + 'static,
{
    fn on_frame(&mut self, frame: Frame) {
        (self.callback)(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unbounded_channel_sink() {
        let (mut sink, mut rx) = event_channel();

        sink.on_frame(Frame::new(b"abc".to_vec()));
        sink.on_closed(None);

        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Frame(Frame::new(b"abc".to_vec())))
        );
        assert_eq!(rx.recv().await, Some(StreamEvent::Closed { reason: None }));
    }

    #[tokio::test]
    async fn test_bounded_channel_drops_when_full() {
        let (mut sink, mut rx) = mpsc::channel::<StreamEvent>(1);

        sink.on_frame(Frame::new(b"kept".to_vec()));
        sink.on_frame(Frame::new(b"dropped".to_vec()));
        drop(sink);

        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Frame(Frame::new(b"kept".to_vec())))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_callback_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();

        let mut sink: Box<dyn FrameSink> = Box::new(from_fn(move |frame: Frame| {
            seen.fetch_add(frame.len(), Ordering::SeqCst);
        }));
        sink.on_frame(Frame::new(b"1234".to_vec()));
        sink.on_frame(Frame::new(b"56".to_vec()));
        sink.on_closed(Some("eof".to_string()));

        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }
}
