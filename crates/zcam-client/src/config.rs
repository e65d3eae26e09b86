//! Camera and preview-stream configuration

use serde::{Deserialize, Serialize};
use zcam_core::{
    DeliveryMode, DEFAULT_CAMERA_IP, DEFAULT_CONTROL_PORT, DEFAULT_DCIM_FOLDER,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_PREVIEW_PORT,
};
use zcam_transport::TcpConfig;

/// Where one camera module lives on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Module IP address
    pub ip: String,
    /// HTTP control port
    pub control_port: u16,
    /// Preview streaming port
    pub preview_port: u16,
    /// DCIM folder whose files [`Camera::list_files`](crate::Camera::list_files) reports
    pub dcim_folder: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_CAMERA_IP.to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            preview_port: DEFAULT_PREVIEW_PORT,
            dcim_folder: DEFAULT_DCIM_FOLDER.to_string(),
        }
    }
}

impl CameraConfig {
    /// Config for a module at `ip`, default ports
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    /// Root URL of the HTTP control interface
    pub fn control_root(&self) -> String {
        format!("http://{}:{}", self.ip, self.control_port)
    }

    /// Control path of the DCIM folder, e.g. `/DCIM/100MEDIA`
    pub fn files_path(&self) -> String {
        format!("/DCIM/{}", self.dcim_folder)
    }

    /// `host:port` of the preview stream
    pub fn preview_addr(&self) -> String {
        format!("{}:{}", self.ip, self.preview_port)
    }
}

/// Preview stream settings
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// When completed frames reach the sink
    pub delivery: DeliveryMode,
    /// Headers announcing more than this are treated as anomalies
    pub max_frame_size: u32,
    /// Socket settings
    pub tcp: TcpConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp: TcpConfig::default(),
        }
    }
}
