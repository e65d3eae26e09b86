//! Z CAM Client Library
//!
//! Client for Z CAM S1 camera modules. The interesting part is the live
//! preview stream: a pull-based TCP stream of length-prefixed frames, driven
//! by one-byte frame requests.
//!
//! One [`Camera`] (or bare [`PreviewClient`]) talks to exactly one module.
//! An S1 rig has four modules, so drive it with four independent instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use zcam_client::{Camera, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> zcam_client::Result<()> {
//!     let camera = Camera::builder().ip("10.98.32.1").build()?;
//!
//!     let (sink, mut events) = zcam_client::event_channel();
//!     camera.preview().open(sink).await?;
//!     let _pacer = camera.preview().flow_controller().pace(Duration::from_millis(100));
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             StreamEvent::Frame(frame) => println!("{} bytes", frame.len()),
//!             StreamEvent::Closed { .. } => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod camera;
pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod flow;
pub mod preview;
pub mod sink;

pub use builder::CameraBuilder;
pub use camera::Camera;
pub use config::{CameraConfig, PreviewConfig};
pub use connection::{Connection, LinkId};
pub use control::{ApiResponse, CameraInfo, ControlClient};
pub use error::{ClientError, Result};
pub use flow::{FlowController, MIN_PACE_INTERVAL};
pub use preview::{PreviewClient, StreamStats};
pub use sink::{event_channel, from_fn, CallbackSink, FrameSink, StreamEvent};

pub use zcam_core::{DeliveryMode, Frame};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::CameraBuilder;
    pub use crate::camera::Camera;
    pub use crate::error::{ClientError, Result};
    pub use crate::preview::PreviewClient;
    pub use crate::sink::{FrameSink, StreamEvent};
    pub use zcam_core::{DeliveryMode, Frame};
}
