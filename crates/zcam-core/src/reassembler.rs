//! Chunk-driven frame reassembly.
//!
//! The preview stream has no in-band delimiters: a chunk of exactly four
//! bytes is a length header, anything else is payload. The reassembler is a
//! two-state machine fed one transport chunk at a time:
//! - `AwaitingHeader`: no frame length is known yet
//! - `Accumulating`: header seen, collecting payload up to its length
//!
//! It performs no I/O. Every [`FrameReassembler::push`] returns a [`Step`]
//! telling the caller what to do next: hand a frame to the sink, ask the
//! device for more data, or log an anomaly.
//!
//! # Example
//!
//! ```
//! use zcam_core::{DeliveryMode, FrameReassembler};
//!
//! let mut reassembler = FrameReassembler::with_mode(DeliveryMode::OnCompletion);
//!
//! assert!(reassembler.push(&[0, 0, 0, 5]).frame.is_none());
//! let step = reassembler.push(b"hello");
//! assert_eq!(step.frame.unwrap().as_ref(), b"hello");
//! ```

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::frame::{self, Frame};
use crate::{Anomaly, DEFAULT_MAX_FRAME_SIZE};

/// Upper bound on the buffer pre-allocated from an announced length.
const MAX_PREALLOC: usize = 1024 * 1024;

/// When a completed frame is handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Hold a completed frame until the next header arrives.
    ///
    /// Matches the behaviour existing camera drivers rely on, including an
    /// empty frame being emitted when the first header of a stream arrives.
    #[default]
    OnNextHeader,
    /// Emit a frame as soon as its last byte arrives.
    OnCompletion,
}

/// Framing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyState {
    /// No frame length known yet.
    AwaitingHeader,
    /// Header parsed, collecting payload. `buf.len() <= expected` always.
    Accumulating { expected: u32, buf: BytesMut },
}

impl ReassemblyState {
    /// True when a full frame is held waiting for the next header
    pub fn is_complete(&self) -> bool {
        match self {
            ReassemblyState::AwaitingHeader => false,
            ReassemblyState::Accumulating { expected, buf } => buf.len() == *expected as usize,
        }
    }
}

/// Outcome of feeding one chunk to the reassembler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Step {
    /// Frame ready for the sink
    pub frame: Option<Frame>,
    /// The device should be asked for the next frame (short read or recovery)
    pub request_frame: bool,
    /// Framing anomaly observed while processing the chunk
    pub anomaly: Option<Anomaly>,
}

impl Step {
    fn deliver(frame: Frame) -> Self {
        Self {
            frame: Some(frame),
            ..Self::default()
        }
    }

    fn request() -> Self {
        Self {
            request_frame: true,
            ..Self::default()
        }
    }

    fn recover(anomaly: Anomaly) -> Self {
        Self {
            frame: None,
            request_frame: true,
            anomaly: Some(anomaly),
        }
    }
}

/// What was left in the reassembler when its connection went away
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Teardown {
    /// A complete frame that was still held for delivery
    pub frame: Option<Frame>,
    /// Bytes of an unfinished frame that were dropped
    pub discarded: usize,
}

/// Reassembles preview frames from raw transport chunks.
#[derive(Debug, Clone)]
pub struct FrameReassembler {
    state: ReassemblyState,
    mode: DeliveryMode,
    max_frame_size: u32,
}

impl FrameReassembler {
    /// Create a reassembler with the default (next-header) delivery mode
    pub fn new() -> Self {
        Self::with_mode(DeliveryMode::default())
    }

    pub fn with_mode(mode: DeliveryMode) -> Self {
        Self {
            state: ReassemblyState::AwaitingHeader,
            mode,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Reject headers announcing more than `max` bytes
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.max_frame_size = max;
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn state(&self) -> &ReassemblyState {
        &self.state
    }

    /// Payload bytes collected for the current frame
    pub fn buffered(&self) -> usize {
        match &self.state {
            ReassemblyState::AwaitingHeader => 0,
            ReassemblyState::Accumulating { buf, .. } => buf.len(),
        }
    }

    /// Feed one chunk, exactly as the transport delivered it.
    pub fn push(&mut self, chunk: &[u8]) -> Step {
        if chunk.is_empty() {
            return Step::default();
        }

        match std::mem::replace(&mut self.state, ReassemblyState::AwaitingHeader) {
            ReassemblyState::AwaitingHeader => match frame::decode_header(chunk) {
                Ok(len) => {
                    let previous = match self.mode {
                        DeliveryMode::OnNextHeader => Some(Frame::empty()),
                        DeliveryMode::OnCompletion => None,
                    };
                    self.start_frame(len, previous)
                }
                Err(_) => Step::recover(Anomaly::UnexpectedChunk { len: chunk.len() }),
            },

            ReassemblyState::Accumulating { expected, mut buf } => {
                let limit = expected as usize;

                if buf.len() == limit {
                    // Only reachable in next-header mode: the frame is held.
                    return match frame::decode_header(chunk) {
                        Ok(len) => self.start_frame(len, Some(Frame::new(buf.freeze()))),
                        Err(_) => {
                            self.state = ReassemblyState::Accumulating { expected, buf };
                            Step::recover(Anomaly::UnexpectedChunk { len: chunk.len() })
                        }
                    };
                }

                let received = buf.len() + chunk.len();
                if received > limit {
                    // Partial frame is dropped; state is already AwaitingHeader.
                    let overrun = Anomaly::Overrun { expected, received };
                    return match frame::decode_header(chunk) {
                        // No room left for it as payload: it opens the next frame.
                        Ok(len) => {
                            let mut step = self.start_frame(len, None);
                            step.anomaly.get_or_insert(overrun);
                            step
                        }
                        Err(_) => Step::recover(overrun),
                    };
                }

                buf.extend_from_slice(chunk);

                if received < limit {
                    trace!("Short read: {}/{} bytes", received, limit);
                    self.state = ReassemblyState::Accumulating { expected, buf };
                    return Step::request();
                }

                match self.mode {
                    DeliveryMode::OnCompletion => Step::deliver(Frame::new(buf.freeze())),
                    DeliveryMode::OnNextHeader => {
                        self.state = ReassemblyState::Accumulating { expected, buf };
                        Step::default()
                    }
                }
            }
        }
    }

    /// Drain the reassembler when the connection closes.
    ///
    /// A complete held frame is returned for delivery; an unfinished one is
    /// dropped. The state is reset either way.
    pub fn finish(&mut self) -> Teardown {
        match std::mem::replace(&mut self.state, ReassemblyState::AwaitingHeader) {
            ReassemblyState::AwaitingHeader => Teardown::default(),
            ReassemblyState::Accumulating { expected, buf } if buf.len() == expected as usize => {
                Teardown {
                    frame: Some(Frame::new(buf.freeze())),
                    discarded: 0,
                }
            }
            ReassemblyState::Accumulating { buf, .. } => Teardown {
                frame: None,
                discarded: buf.len(),
            },
        }
    }

    /// Drop any partial frame and wait for a header
    pub fn reset(&mut self) {
        self.state = ReassemblyState::AwaitingHeader;
    }

    /// Switch to `Accumulating` for a freshly parsed header.
    fn start_frame(&mut self, len: u32, previous: Option<Frame>) -> Step {
        if len > self.max_frame_size {
            return Step {
                frame: previous,
                request_frame: true,
                anomaly: Some(Anomaly::FrameTooLarge {
                    announced: len,
                    max: self.max_frame_size,
                }),
            };
        }

        debug!("Frame header: {} bytes", len);

        if len == 0 && self.mode == DeliveryMode::OnCompletion {
            return Step::deliver(Frame::empty());
        }

        self.state = ReassemblyState::Accumulating {
            expected: len,
            buf: BytesMut::with_capacity((len as usize).min(MAX_PREALLOC)),
        };

        Step {
            frame: previous,
            ..Step::default()
        }
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}
