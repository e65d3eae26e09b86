//! Preview frame and length header
//!
//! Preview stream wire format (device → client):
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header:  4 bytes, payload length (u32 BE)    │
//! ├──────────────────────────────────────────────┤
//! │ Payload: `length` bytes, one or more chunks  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! There is no magic byte, checksum, sequence id or type tag. The header is
//! recognised only by arriving as a chunk of exactly [`HEADER_SIZE`] bytes.

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Length header size
pub const HEADER_SIZE: usize = 4;

/// Decode a length header
pub fn decode_header(chunk: &[u8]) -> Result<u32> {
    let bytes: [u8; HEADER_SIZE] = chunk
        .try_into()
        .map_err(|_| Error::InvalidHeader(chunk.len()))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Encode a length header for a payload of `len` bytes
pub fn encode_header(len: usize) -> Result<[u8; HEADER_SIZE]> {
    let len = u32::try_from(len).map_err(|_| Error::PayloadTooLarge(len))?;
    Ok(len.to_be_bytes())
}

/// One compressed preview frame, exactly as announced by its header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Create a frame from its payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// An empty frame (header announced zero bytes)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode header + payload as a device would send them
    pub fn encode(&self) -> Result<Bytes> {
        let header = encode_header(self.payload.len())?;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_slice(&header);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.payload
    }
}
