//! Pull-based flow control
//!
//! The device only sends a frame after it receives a `0x01` request byte.
//! How often to ask is up to the caller; [`FlowController::pace`] covers the
//! usual fixed-rate timer.

use bytes::Bytes;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use zcam_core::FRAME_REQUEST;

use crate::connection::Connection;
use crate::error::{ClientError, Result};

const REQUEST: &[u8] = &[FRAME_REQUEST];

/// Shortest period [`FlowController::pace`] will run at
pub const MIN_PACE_INTERVAL: Duration = Duration::from_millis(1);

/// Sends "send next frame" requests over a [`Connection`]
#[derive(Clone)]
pub struct FlowController {
    connection: Connection,
}

impl FlowController {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Ask the device for the next frame
    pub fn request_frame(&self) -> Result<()> {
        self.connection.write(Bytes::from_static(REQUEST))
    }

    /// Request a frame every `interval` until the connection goes away.
    ///
    /// Requests are not tied to frame arrival, so several may be outstanding
    /// at once. Ticks missed while the runtime was busy are skipped.
    /// Intervals below [`MIN_PACE_INTERVAL`] are raised to it.
    pub fn pace(&self, interval: Duration) -> JoinHandle<()> {
        if interval < MIN_PACE_INTERVAL {
            warn!("Pacing interval {:?} too short, using {:?}", interval, MIN_PACE_INTERVAL);
        }
        let interval = interval.max(MIN_PACE_INTERVAL);
        let flow = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match flow.request_frame() {
                    Ok(()) => {}
                    Err(ClientError::NotConnected) => {
                        debug!("Connection gone, frame pacing stopped");
                        break;
                    }
                    Err(e) => warn!("Frame request failed: {}", e),
                }
            }
        })
    }
}
