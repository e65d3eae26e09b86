//! Common test helpers and utilities for Z CAM tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A mock camera module serving the preview-streaming protocol
//! - Port allocation

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zcam_core::frame::HEADER_SIZE;
use zcam_core::{Frame, FRAME_REQUEST};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Pause between device writes so each lands in its own client read
pub const DEFAULT_WRITE_GAP: Duration = Duration::from_millis(20);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check()
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || counter.load(Ordering::SeqCst) >= target,
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Mock Device
// ============================================================================

/// Shared state between a [`MockDevice`] and its connection tasks
struct DeviceState {
    frames: Mutex<VecDeque<Frame>>,
    requests: AtomicU32,
    connections: AtomicU32,
    write_gap: Duration,
}

/// A fake camera module listening on the preview-streaming port.
///
/// Each `0x01` request byte pops the next queued frame and sends it as two
/// spaced writes: the 4-byte header, then the payload. Requests that arrive
/// with the queue empty are counted and ignored.
pub struct MockDevice {
    port: u16,
    state: Arc<DeviceState>,
    /// Bumped to drop every connection open at that moment
    disconnect: watch::Sender<u64>,
    handle: Option<JoinHandle<()>>,
}

impl MockDevice {
    /// Start a device with frames queued for the first requests
    pub async fn start(frames: Vec<Vec<u8>>) -> Self {
        Self::start_with_gap(frames, DEFAULT_WRITE_GAP).await
    }

    pub async fn start_with_gap(frames: Vec<Vec<u8>>, write_gap: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(DeviceState {
            frames: Mutex::new(frames.into_iter().map(Frame::new).collect()),
            requests: AtomicU32::new(0),
            connections: AtomicU32::new(0),
            write_gap,
        });
        let (disconnect, generation) = watch::channel(0u64);

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("Mock device accepted {}", peer);
                let mut dropped = generation.clone();
                dropped.borrow_and_update();
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(stream, accept_state.clone(), dropped));
            }
        });

        Self {
            port,
            state,
            disconnect,
            handle: Some(handle),
        }
    }

    pub fn host(&self) -> &'static str {
        "127.0.0.1"
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Number of request bytes received so far
    pub fn requests(&self) -> u32 {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Counter behind [`requests`](Self::requests), for [`wait_for_count`]
    pub fn request_counter(&self) -> &AtomicU32 {
        &self.state.requests
    }

    /// Number of connections accepted so far
    pub fn connections(&self) -> u32 {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Queue another frame
    pub fn push_frame(&self, payload: impl Into<Bytes>) {
        self.state.frames.lock().push_back(Frame::new(payload));
    }

    /// Frames not yet sent
    pub fn pending_frames(&self) -> usize {
        self.state.frames.lock().len()
    }

    /// Drop every open client connection
    pub fn disconnect(&self) {
        self.disconnect.send_modify(|generation| *generation += 1);
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    state: Arc<DeviceState>,
    mut dropped: watch::Receiver<u64>,
) {
    let _ = stream.set_nodelay(true);
    let mut buf = [0u8; 64];

    loop {
        let n = tokio::select! {
            _ = dropped.changed() => {
                debug!("Mock device dropping connection");
                return;
            }
            result = stream.read(&mut buf) => match result {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            },
        };

        for &byte in &buf[..n] {
            if byte != FRAME_REQUEST {
                warn!("Mock device ignoring byte 0x{:02x}", byte);
                continue;
            }
            state.requests.fetch_add(1, Ordering::SeqCst);

            let next = state.frames.lock().pop_front();
            let Some(frame) = next else {
                continue;
            };

            if send_frame(&mut stream, &frame, state.write_gap).await.is_err() {
                return;
            }
        }
    }
}

/// Header and payload go out as separate writes
async fn send_frame(stream: &mut TcpStream, frame: &Frame, gap: Duration) -> std::io::Result<()> {
    let encoded = frame
        .encode()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let (header, payload) = encoded.split_at(HEADER_SIZE);

    stream.write_all(header).await?;
    tokio::time::sleep(gap).await;

    if !payload.is_empty() {
        stream.write_all(payload).await?;
        tokio::time::sleep(gap).await;
    }
    Ok(())
}
