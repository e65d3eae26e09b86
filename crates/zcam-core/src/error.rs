//! Error types for the preview stream

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Header must be exactly 4 bytes
    #[error("invalid header length: expected 4 bytes, got {0}")]
    InvalidHeader(usize),

    /// Payload does not fit the 32-bit length header
    #[error("payload too large for a 4-byte header: {0} bytes")]
    PayloadTooLarge(usize),
}

/// A chunk that does not fit the expected framing shape.
///
/// Anomalies are recovered locally by re-requesting a frame and are never
/// fatal to the stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Non-header chunk while no frame length is known
    #[error("unexpected {len}-byte chunk while awaiting a header")]
    UnexpectedChunk { len: usize },

    /// Chunk would push the frame past its announced length
    #[error("frame overrun: announced {expected} bytes, received {received}")]
    Overrun { expected: u32, received: usize },

    /// Header announced more than the configured maximum
    #[error("frame too large: announced {announced} bytes (max {max})")]
    FrameTooLarge { announced: u32, max: u32 },
}
