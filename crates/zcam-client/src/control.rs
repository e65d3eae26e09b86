//! Minimal HTTP control plane
//!
//! Only what is needed to identify a module and find its recordings: the
//! endpoint root, the `{code, msg, desc}` response envelope, `/info` and the
//! DCIM file listing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Envelope returned by most control endpoints
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: serde_json::Value,
    #[serde(default)]
    pub desc: Option<String>,
}

impl ApiResponse {
    /// `msg` on success (`code == 0`), [`ClientError::Api`] otherwise
    pub fn into_result(self) -> Result<serde_json::Value> {
        if self.code == 0 {
            return Ok(self.msg);
        }

        let msg = match self.msg {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Err(ClientError::Api {
            code: self.code,
            msg,
            desc: self.desc.unwrap_or_default(),
        })
    }
}

/// General information reported by `/info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    #[serde(default)]
    pub model: String,
    /// Software version
    #[serde(default)]
    pub sw: String,
    /// Hardware version
    #[serde(default)]
    pub hw: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub sn: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Enveloped directory listing
#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(flatten)]
    envelope: ApiResponse,
    #[serde(default)]
    files: Vec<String>,
}

/// HTTP client for one module's control interface
#[derive(Debug, Clone)]
pub struct ControlClient {
    root: String,
    http: reqwest::Client,
}

impl ControlClient {
    pub fn new(root: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            root: root.into(),
            http,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    /// Model, versions and identifiers of the module
    pub async fn info(&self) -> Result<CameraInfo> {
        let url = self.url("/info");
        let response = self.http.get(&url).send().await?;
        debug!("HTTP GET {} -> {}", url, response.status());
        Ok(response.json().await?)
    }

    /// Names of the files in a DCIM folder such as `/DCIM/100MEDIA`
    pub async fn list_files(&self, folder: &str) -> Result<Vec<String>> {
        let url = format!("{}?p=1&v=1", self.url(folder));
        let response = self.http.get(&url).send().await?;
        debug!("HTTP GET {} -> {}", url, response.status());
        let listing: FileListing = response.json().await?;
        listing.envelope.into_result()?;
        Ok(listing.files)
    }
}
