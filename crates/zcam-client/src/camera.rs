//! One camera module: control plane plus preview stream

use crate::builder::CameraBuilder;
use crate::config::CameraConfig;
use crate::control::{CameraInfo, ControlClient};
use crate::error::Result;
use crate::preview::PreviewClient;

/// A single Z CAM module.
///
/// Owns its own control client and preview connection; nothing is shared
/// between instances, so the four modules of an S1 rig are simply four
/// `Camera`s.
pub struct Camera {
    config: CameraConfig,
    control: ControlClient,
    preview: PreviewClient,
}

impl Camera {
    pub(crate) fn from_parts(
        config: CameraConfig,
        control: ControlClient,
        preview: PreviewClient,
    ) -> Self {
        Self {
            config,
            control,
            preview,
        }
    }

    /// Create a builder
    pub fn builder() -> CameraBuilder {
        CameraBuilder::new()
    }

    /// Camera with default preview settings
    pub fn new(config: CameraConfig) -> Result<Self> {
        CameraBuilder::from_config(config).build()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn control(&self) -> &ControlClient {
        &self.control
    }

    pub fn preview(&self) -> &PreviewClient {
        &self.preview
    }

    /// Shorthand for `control().info()`
    pub async fn info(&self) -> Result<CameraInfo> {
        self.control.info().await
    }

    /// Files in the configured DCIM folder
    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.control.list_files(&self.config.files_path()).await
    }
}
