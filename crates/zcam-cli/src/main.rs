//! zcam - command-line tool for Z CAM camera modules
//!
//! Dump live preview streams to disk and query module information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zcam_client::{Camera, CameraConfig};
use zcam_core::{DEFAULT_CAMERA_IP, DEFAULT_CONTROL_PORT, DEFAULT_DCIM_FOLDER};

mod config;
mod dump;

use config::{Delivery, DumpArgs, DumpSettings, FileConfig};

/// zcam - Z CAM preview stream and control tool
#[derive(Parser)]
#[command(name = "zcam")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "ZCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append preview frames of one or more modules to files
    Dump {
        /// Module IP address; repeat for several modules
        #[arg(short, long = "ip")]
        ips: Vec<String>,

        /// Preview streaming port
        #[arg(short = 'P', long)]
        preview_port: Option<u16>,

        /// Frame requests per second
        #[arg(short, long)]
        fps: Option<f64>,

        /// Output file; suffixed -1, -2... with several modules
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// When frames are handed out
        #[arg(short, long, value_enum)]
        delivery: Option<Delivery>,

        /// Stop each module after this many frames
        #[arg(short = 'n', long)]
        max_frames: Option<u64>,
    },

    /// Print the /info document of a module
    Info {
        /// Module IP address
        #[arg(short, long, default_value = DEFAULT_CAMERA_IP)]
        ip: String,

        /// HTTP control port
        #[arg(short = 'P', long, default_value_t = DEFAULT_CONTROL_PORT)]
        port: u16,
    },

    /// List the files in a module's DCIM folder
    Files {
        /// Module IP address
        #[arg(short, long, default_value = DEFAULT_CAMERA_IP)]
        ip: String,

        /// HTTP control port
        #[arg(short = 'P', long, default_value_t = DEFAULT_CONTROL_PORT)]
        port: u16,

        /// DCIM folder
        #[arg(short, long, default_value = DEFAULT_DCIM_FOLDER)]
        folder: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    // Handle Ctrl+C
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                warn!("Failed to listen for ctrl+c: {}", e);
                // Hold the sender: a closed channel reads as shutdown
                std::future::pending::<()>().await;
            }
        }
    });

    match cli.command {
        Commands::Dump {
            ips,
            preview_port,
            fps,
            output,
            delivery,
            max_frames,
        } => {
            let args = DumpArgs {
                ips,
                preview_port,
                fps,
                output,
                delivery,
                max_frames,
            };
            let settings = DumpSettings::resolve(file_config, args)?;
            dump::run_dump(settings, &mut shutdown_rx).await?;
        }

        Commands::Info { ip, port } => {
            print_info(&ip, port).await?;
        }

        Commands::Files { ip, port, folder } => {
            print_files(&ip, port, &folder).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

async fn print_info(ip: &str, port: u16) -> Result<()> {
    let config = CameraConfig {
        ip: ip.to_string(),
        control_port: port,
        ..CameraConfig::default()
    };
    let root = config.control_root();
    let camera = Camera::new(config)?;

    let info = camera
        .info()
        .await
        .with_context(|| format!("Failed to query {}/info", root))?;

    println!("{} {}", "ZCAM".cyan().bold(), root.yellow());
    println!("Model:      {}", info.model);
    println!("Software:   {}", info.sw);
    println!("Hardware:   {}", info.hw);
    if let Some(sn) = &info.sn {
        println!("Serial:     {}", sn);
    }
    if let Some(mac) = &info.mac {
        println!("MAC:        {}", mac);
    }
    if !info.extra.is_empty() {
        println!();
        println!("{}", serde_json::to_string_pretty(&info.extra)?);
    }

    Ok(())
}

async fn print_files(ip: &str, port: u16, folder: &str) -> Result<()> {
    let config = CameraConfig {
        ip: ip.to_string(),
        control_port: port,
        dcim_folder: folder.to_string(),
        ..CameraConfig::default()
    };
    let path = config.files_path();
    let camera = Camera::new(config)?;

    let files = camera
        .list_files()
        .await
        .with_context(|| format!("Failed to list {} on {}", path, ip))?;

    println!("{} {} ({} files)", "ZCAM".cyan().bold(), path.yellow(), files.len());
    for file in files {
        println!("  {}", file);
    }

    Ok(())
}
