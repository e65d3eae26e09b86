//! Live preview client
//!
//! Ties a [`Connection`], a [`FrameReassembler`] and a caller's
//! [`FrameSink`] together. Each successful [`PreviewClient::open`] spawns one
//! reader task that owns the reassembler and the sink for the lifetime of
//! that socket:
//!
//! ```text
//! socket ──chunks──▶ FrameReassembler ──frames──▶ FrameSink
//!    ▲                      │
//!    └──── 0x01 ◀── FlowController (short reads, anomalies, caller's timer)
//! ```
//!
//! When the socket closes the task flushes a held frame, releases the
//! connection so `open` works again, and reports `on_closed` to the sink.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zcam_core::{Frame, FrameReassembler, Step};
use zcam_transport::{TcpReceiver, TransportEvent, TransportReceiver};

use crate::config::PreviewConfig;
use crate::connection::{Connection, LinkId};
use crate::error::Result;
use crate::flow::FlowController;
use crate::sink::FrameSink;

/// Counters since the client was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub bytes: u64,
    pub anomalies: u64,
    /// Requests issued by the reader itself (short reads and recovery)
    pub follow_up_requests: u64,
    pub connections: u64,
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    bytes: AtomicU64,
    anomalies: AtomicU64,
    follow_up_requests: AtomicU64,
    connections: AtomicU64,
}

/// Preview stream client for one camera module
pub struct PreviewClient {
    host: String,
    port: u16,
    config: PreviewConfig,
    connection: Connection,
    flow: FlowController,
    counters: Arc<Counters>,
}

impl PreviewClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(host, port, PreviewConfig::default())
    }

    pub fn with_config(host: impl Into<String>, port: u16, config: PreviewConfig) -> Self {
        let connection = Connection::new(config.tcp.clone());
        let flow = FlowController::new(connection.clone());
        Self {
            host: host.into(),
            port,
            config,
            connection,
            flow,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Connect to the preview port and start feeding `sink`.
    ///
    /// Fails with `AlreadyConnected` while a previous session is still open;
    /// that session is left untouched.
    pub async fn open<S: FrameSink>(&self, sink: S) -> Result<()> {
        let (link, receiver) = self.connection.open(&self.host, self.port).await?;
        self.counters.connections.fetch_add(1, Ordering::Relaxed);

        let reassembler = FrameReassembler::with_mode(self.config.delivery)
            .max_frame_size(self.config.max_frame_size);

        let session = Session {
            link,
            connection: self.connection.clone(),
            flow: self.flow.clone(),
            reassembler,
            sink,
            counters: self.counters.clone(),
        };
        tokio::spawn(session.run(receiver));

        Ok(())
    }

    /// Ask the device for the next frame
    pub fn request_frame(&self) -> Result<()> {
        self.flow.request_frame()
    }

    /// Send raw bytes to the device
    pub fn write(&self, data: Bytes) -> Result<()> {
        self.connection.write(data)
    }

    /// Flow controller bound to this client's connection
    pub fn flow_controller(&self) -> FlowController {
        self.flow.clone()
    }

    /// Close the socket; the sink receives `on_closed` shortly after.
    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            bytes: self.counters.bytes.load(Ordering::Relaxed),
            anomalies: self.counters.anomalies.load(Ordering::Relaxed),
            follow_up_requests: self.counters.follow_up_requests.load(Ordering::Relaxed),
            connections: self.counters.connections.load(Ordering::Relaxed),
        }
    }
}

/// Reader side of one open socket
struct Session<S> {
    link: LinkId,
    connection: Connection,
    flow: FlowController,
    reassembler: FrameReassembler,
    sink: S,
    counters: Arc<Counters>,
}

impl<S: FrameSink> Session<S> {
    async fn run(mut self, mut receiver: TcpReceiver) {
        let reason = loop {
            match receiver.recv().await {
                Some(TransportEvent::Data(chunk)) => {
                    let step = self.reassembler.push(&chunk);
                    self.apply(step);
                }
                Some(TransportEvent::Disconnected { reason }) => break reason,
                Some(TransportEvent::Error(e)) => break Some(e),
                None => break None,
            }
        };

        // Release first so the sink owner can re-open from on_closed
        self.connection.release(self.link);

        let teardown = self.reassembler.finish();
        if teardown.discarded > 0 {
            debug!("Dropped {} bytes of an unfinished frame", teardown.discarded);
        }
        if let Some(frame) = teardown.frame {
            self.deliver(frame);
        }

        info!("Preview stream closed: {}", reason.as_deref().unwrap_or("by device"));
        self.sink.on_closed(reason);
    }

    fn apply(&mut self, step: Step) {
        if let Some(anomaly) = step.anomaly {
            self.counters.anomalies.fetch_add(1, Ordering::Relaxed);
            warn!("Preview stream anomaly: {}", anomaly);
        }

        if let Some(frame) = step.frame {
            self.deliver(frame);
        }

        if step.request_frame {
            self.counters.follow_up_requests.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.flow.request_frame() {
                debug!("Follow-up frame request failed: {}", e);
            }
        }
    }

    fn deliver(&mut self, frame: Frame) {
        debug!("Frame received: {} bytes", frame.len());
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes.fetch_add(frame.len() as u64, Ordering::Relaxed);
        self.sink.on_frame(frame);
    }
}
