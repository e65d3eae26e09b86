//! Transport trait definitions

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Events that can occur on a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One read's worth of bytes, boundaries as the socket returned them
    Data(Bytes),
    /// Connection closed (by either side)
    Disconnected { reason: Option<String> },
    /// I/O error; the connection is gone afterwards
    Error(String),
}

/// Trait for sending data
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Send data, waiting for room in the outbound queue
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Queue data without waiting
    fn try_send(&self, data: Bytes) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Trait for receiving data
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event
    async fn recv(&mut self) -> Option<TransportEvent>;
}
