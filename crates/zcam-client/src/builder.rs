//! Camera builder pattern

use std::time::Duration;
use zcam_core::DeliveryMode;
use zcam_transport::TcpConfig;

use crate::config::{CameraConfig, PreviewConfig};
use crate::control::ControlClient;
use crate::preview::PreviewClient;
use crate::{Camera, Result};

/// Builder for [`Camera`]
pub struct CameraBuilder {
    config: CameraConfig,
    preview: PreviewConfig,
    http_timeout: Duration,
}

impl CameraBuilder {
    /// Create a new builder with default addresses
    pub fn new() -> Self {
        Self::from_config(CameraConfig::default())
    }

    pub fn from_config(config: CameraConfig) -> Self {
        Self {
            config,
            preview: PreviewConfig::default(),
            http_timeout: Duration::from_secs(10),
        }
    }

    /// Set module IP address
    pub fn ip(mut self, ip: &str) -> Self {
        self.config.ip = ip.to_string();
        self
    }

    /// Set HTTP control port
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.control_port = port;
        self
    }

    /// Set preview streaming port
    pub fn preview_port(mut self, port: u16) -> Self {
        self.config.preview_port = port;
        self
    }

    /// Set DCIM folder
    pub fn dcim_folder(mut self, folder: &str) -> Self {
        self.config.dcim_folder = folder.to_string();
        self
    }

    /// Choose when completed frames reach the sink
    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.preview.delivery = mode;
        self
    }

    /// Largest frame accepted from the device
    pub fn max_frame_size(mut self, bytes: u32) -> Self {
        self.preview.max_frame_size = bytes;
        self
    }

    /// Socket settings for the preview connection
    pub fn tcp(mut self, tcp: TcpConfig) -> Self {
        self.preview.tcp = tcp;
        self
    }

    /// Timeout for control-plane requests
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Camera> {
        let control = ControlClient::new(self.config.control_root(), self.http_timeout)?;
        let preview =
            PreviewClient::with_config(&self.config.ip, self.config.preview_port, self.preview);
        Ok(Camera::from_parts(self.config, control, preview))
    }
}

impl Default for CameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}
