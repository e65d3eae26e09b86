//! Z CAM Core
//!
//! Wire constants and the sans-IO framing layer for the Z CAM S1 live
//! preview stream.
//!
//! This crate provides:
//! - Preview frame type ([`Frame`]) and the 4-byte length header codec ([`frame`])
//! - The chunk-driven frame reassembler ([`FrameReassembler`], [`Step`])
//! - Framing anomalies and core errors ([`Anomaly`], [`Error`])

pub mod error;
pub mod frame;
pub mod reassembler;

pub use error::{Anomaly, Error, Result};
pub use frame::Frame;
pub use reassembler::{DeliveryMode, FrameReassembler, ReassemblyState, Step, Teardown};

/// The only message a client ever sends: "send the next frame"
pub const FRAME_REQUEST: u8 = 0x01;

/// Default preview streaming port
pub const DEFAULT_PREVIEW_PORT: u16 = 9876;

/// Default HTTP control port
pub const DEFAULT_CONTROL_PORT: u16 = 80;

/// Default camera address (module 1 of an S1 rig)
pub const DEFAULT_CAMERA_IP: &str = "10.98.32.1";

/// Default DCIM folder on the SD card
pub const DEFAULT_DCIM_FOLDER: &str = "100MEDIA";

/// Largest frame the reassembler accepts by default (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;
