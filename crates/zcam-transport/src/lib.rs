//! Z CAM Transport Layer
//!
//! Raw TCP transport for the preview stream. Unlike a message transport it
//! applies no framing of its own: every socket read is surfaced as one
//! [`TransportEvent::Data`] chunk, because the preview protocol tells
//! headers from payload by chunk size alone.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpReceiver, TcpSender, TcpTransport};
pub use traits::{TransportEvent, TransportReceiver, TransportSender};
