//! Dump configuration: TOML file merged with command-line flags

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zcam_client::{CameraConfig, DeliveryMode};

/// Default request rate of `zcam dump`
pub const DEFAULT_FPS: f64 = 10.0;

/// Default output file of `zcam dump`
pub const DEFAULT_OUTPUT: &str = "frame.264";

/// Frame delivery timing, as spelled on the command line and in TOML
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delivery {
    /// Hold each frame until the next header
    #[default]
    NextHeader,
    /// Emit each frame as soon as it is complete
    Completion,
}

impl From<Delivery> for DeliveryMode {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::NextHeader => DeliveryMode::OnNextHeader,
            Delivery::Completion => DeliveryMode::OnCompletion,
        }
    }
}

/// Contents of a `--config` file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub modules: Vec<CameraConfig>,
    pub fps: Option<f64>,
    pub output: Option<PathBuf>,
    pub delivery: Option<Delivery>,
    pub max_frame_size: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Flags of `zcam dump` that may override the file
#[derive(Debug, Clone, Default)]
pub struct DumpArgs {
    pub ips: Vec<String>,
    pub preview_port: Option<u16>,
    pub fps: Option<f64>,
    pub output: Option<PathBuf>,
    pub delivery: Option<Delivery>,
    pub max_frames: Option<u64>,
}

/// Fully resolved dump settings
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSettings {
    pub modules: Vec<CameraConfig>,
    pub fps: f64,
    /// Time between frame requests, `1 / fps`
    pub interval: Duration,
    pub output: PathBuf,
    pub delivery: DeliveryMode,
    pub max_frame_size: Option<u32>,
    pub max_frames: Option<u64>,
}

impl DumpSettings {
    /// Flags win over the file; `--ip` replaces the file's module list.
    pub fn resolve(file: FileConfig, args: DumpArgs) -> Result<Self> {
        let mut modules = if args.ips.is_empty() {
            file.modules
        } else {
            args.ips.into_iter().map(CameraConfig::with_ip).collect()
        };
        if modules.is_empty() {
            modules.push(CameraConfig::default());
        }
        if let Some(port) = args.preview_port {
            for module in &mut modules {
                module.preview_port = port;
            }
        }

        let fps = args.fps.or(file.fps).unwrap_or(DEFAULT_FPS);
        if !(fps.is_finite() && fps > 0.0) {
            bail!("fps must be a positive number, got {}", fps);
        }
        let interval = match Duration::try_from_secs_f64(1.0 / fps) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => bail!("fps out of range, got {}", fps),
        };

        Ok(Self {
            modules,
            fps,
            interval,
            output: args
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            delivery: args.delivery.or(file.delivery).unwrap_or_default().into(),
            max_frame_size: file.max_frame_size,
            max_frames: args.max_frames,
        })
    }

    /// Output file of module `index` (0-based)
    pub fn output_for(&self, index: usize) -> PathBuf {
        module_output(&self.output, index, self.modules.len())
    }
}

/// `frame.264` for a single module, `frame-1.264`, `frame-2.264`... otherwise
pub fn module_output(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}-{}.{}", stem, index + 1, ext.to_string_lossy()),
        None => format!("{}-{}", stem, index + 1),
    };
    base.with_file_name(name)
}
