//! Single TCP connection to a module's preview port
//!
//! A [`Connection`] is either closed, opening, or open. Opening while not
//! closed is rejected without touching the live socket. Every open attempt
//! gets a fresh [`LinkId`], so neither a stale open nor the reader of an old
//! socket can take over or release a newer one.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use zcam_transport::{
    TcpConfig, TcpReceiver, TcpSender, TcpTransport, TransportError, TransportSender,
};

use crate::error::{ClientError, Result};

/// Identifies one opened socket of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

enum LinkState {
    Closed,
    Opening { attempt: LinkId },
    Open { id: LinkId, sender: Arc<TcpSender> },
}

struct Inner {
    state: Mutex<LinkState>,
    next_id: AtomicU64,
    tcp: TcpConfig,
}

/// At most one socket to the device, shared by the reader task and the
/// flow controller.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

/// Puts the state back to `Closed` if an open attempt is abandoned.
struct OpeningGuard<'a> {
    state: &'a Mutex<LinkState>,
    attempt: LinkId,
    armed: bool,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if matches!(*state, LinkState::Opening { attempt } if attempt == self.attempt) {
                *state = LinkState::Closed;
            }
        }
    }
}

impl Connection {
    pub fn new(tcp: TcpConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LinkState::Closed),
                next_id: AtomicU64::new(1),
                tcp,
            }),
        }
    }

    /// Open the socket; fails with `AlreadyConnected` if one is open or opening.
    pub async fn open(&self, host: &str, port: u16) -> Result<(LinkId, TcpReceiver)> {
        let id = self.begin_open()?;

        let mut guard = OpeningGuard {
            state: &self.inner.state,
            attempt: id,
            armed: true,
        };

        let addr = format!("{}:{}", host, port);
        let (sender, receiver) = TcpTransport::with_config(self.inner.tcp.clone())
            .connect(&addr)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let sender = Arc::new(sender);
        if !self.install(id, &sender) {
            // close() ran while we were connecting
            sender.close().await?;
            return Err(ClientError::ConnectionFailed(
                "closed while opening".to_string(),
            ));
        }
        guard.armed = false;

        info!("Preview connection open to {}", addr);
        Ok((id, receiver))
    }

    /// Claim the closed slot for a new open attempt
    fn begin_open(&self) -> Result<LinkId> {
        let mut state = self.inner.state.lock();
        if !matches!(*state, LinkState::Closed) {
            return Err(ClientError::AlreadyConnected);
        }
        let id = LinkId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        *state = LinkState::Opening { attempt: id };
        Ok(id)
    }

    /// Make `sender` the open link, unless attempt `id` lost its slot
    fn install(&self, id: LinkId, sender: &Arc<TcpSender>) -> bool {
        let mut state = self.inner.state.lock();
        if !matches!(*state, LinkState::Opening { attempt } if attempt == id) {
            return false;
        }
        *state = LinkState::Open {
            id,
            sender: sender.clone(),
        };
        true
    }

    /// Queue raw bytes for the device without waiting
    pub fn write(&self, data: Bytes) -> Result<()> {
        let sender = match &*self.inner.state.lock() {
            LinkState::Open { sender, .. } => sender.clone(),
            _ => return Err(ClientError::NotConnected),
        };

        sender.try_send(data).map_err(|e| match e {
            TransportError::NotConnected | TransportError::ConnectionClosed => {
                ClientError::NotConnected
            }
            other => ClientError::SendFailed(other.to_string()),
        })
    }

    /// Close the socket locally. A no-op when nothing is open.
    pub async fn close(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), LinkState::Closed);
        if let LinkState::Open { sender, .. } = previous {
            debug!("Closing preview connection");
            sender.close().await?;
        }
        Ok(())
    }

    /// Forget link `id` after its socket reported closure
    pub(crate) fn release(&self, id: LinkId) {
        let mut state = self.inner.state.lock();
        if matches!(&*state, LinkState::Open { id: current, .. } if *current == id) {
            *state = LinkState::Closed;
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state.lock(), LinkState::Open { .. })
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(TcpConfig::default())
    }
}
