//! `zcam dump`: append preview frames of one or more modules to files

use anyhow::{Context, Result};
use colored::Colorize;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use zcam_client::{event_channel, Camera, CameraBuilder, StreamEvent};

use crate::config::DumpSettings;

/// Run one dumper per module until each stops or Ctrl+C arrives
pub async fn run_dump(settings: DumpSettings, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
    let interval = settings.interval;
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut dumpers = Vec::with_capacity(settings.modules.len());
    for (index, module) in settings.modules.iter().enumerate() {
        let mut builder = CameraBuilder::from_config(module.clone()).delivery(settings.delivery);
        if let Some(max) = settings.max_frame_size {
            builder = builder.max_frame_size(max);
        }
        let camera = builder
            .build()
            .with_context(|| format!("Failed to set up module {}", module.ip))?;

        let output = settings.output_for(index);
        println!(
            "{} Dumping {} to {} at {} fps",
            "ZCAM".cyan().bold(),
            module.preview_addr().yellow(),
            output.display(),
            settings.fps
        );
        dumpers.push(dump_module(
            camera,
            output,
            interval,
            settings.max_frames,
            stop_rx.clone(),
        ));
    }

    let mut all = Box::pin(join_all(dumpers));
    let results = tokio::select! {
        results = &mut all => results,
        _ = shutdown_rx.recv() => {
            let _ = stop_tx.send(true);
            all.await
        }
    };

    let mut failed = 0;
    for (module, result) in settings.modules.iter().zip(results) {
        match result {
            Ok(frames) => println!(
                "{} {}: {} frames written",
                "OK".green().bold(),
                module.ip,
                frames
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {:#}", "FAILED".red().bold(), module.ip, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} modules failed", failed, settings.modules.len());
    }
    Ok(())
}

/// Stream one module into `path` until the stream closes, `max_frames` are
/// written, or `stop` flips. Returns the number of frames written.
pub async fn dump_module(
    camera: Camera,
    path: PathBuf,
    interval: Duration,
    max_frames: Option<u64>,
    mut stop: watch::Receiver<bool>,
) -> Result<u64> {
    let mut file = open_output(&path).await?;

    let (sink, mut events) = event_channel();
    let addr = camera.config().preview_addr();
    camera
        .preview()
        .open(sink)
        .await
        .with_context(|| format!("Failed to open preview stream of {}", addr))?;
    let pacer = camera.preview().flow_controller().pace(interval);

    let mut written = 0u64;
    let outcome: Result<()> = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(StreamEvent::Frame(frame)) if frame.is_empty() => {
                    debug!("Skipping empty frame");
                }
                Some(StreamEvent::Frame(frame)) => {
                    if let Err(e) = file.write_all(frame.as_ref()).await {
                        let e = anyhow::Error::new(e);
                        break Err(e.context(format!("Failed to write {}", path.display())));
                    }
                    written += 1;
                    info!("Frame {} written ({} bytes)", written, frame.len());

                    if max_frames.is_some_and(|max| written >= max) {
                        break Ok(());
                    }
                }
                Some(StreamEvent::Closed { reason }) => {
                    warn!(
                        "Preview stream of {} closed: {}",
                        camera.config().ip,
                        reason.as_deref().unwrap_or("by device")
                    );
                    break Ok(());
                }
                None => break Ok(()),
            },
            _ = stop.changed() => break Ok(()),
        }
    };

    pacer.abort();
    camera.preview().close().await?;
    file.flush().await?;

    outcome.map(|()| written)
}

async fn open_output(path: &Path) -> Result<tokio::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open output file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zcam_client::DeliveryMode;
    use zcam_test_utils::MockDevice;

    fn camera_for(device: &MockDevice, delivery: DeliveryMode) -> Camera {
        CameraBuilder::new()
            .ip(device.host())
            .preview_port(device.port())
            .delivery(delivery)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_dump_appends_frames_in_order() {
        let device = MockDevice::start(vec![b"aa".to_vec(), b"bbb".to_vec(), b"c".to_vec()]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.264");
        std::fs::write(&path, b"old").unwrap();

        let (_stop_tx, stop_rx) = watch::channel(false);
        let written = dump_module(
            camera_for(&device, DeliveryMode::OnCompletion),
            path.clone(),
            Duration::from_millis(20),
            Some(3),
            stop_rx,
        )
        .await
        .unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&path).unwrap(), b"oldaabbbc");
    }

    #[tokio::test]
    async fn test_dump_stops_when_device_closes() {
        let device = MockDevice::start(vec![b"only".to_vec()]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.264");

        let (_stop_tx, stop_rx) = watch::channel(false);
        let camera = camera_for(&device, DeliveryMode::OnNextHeader);
        let dumper = tokio::spawn(dump_module(
            camera,
            path.clone(),
            Duration::from_millis(20),
            None,
            stop_rx,
        ));

        assert!(
            zcam_test_utils::wait_for(
                || device.pending_frames() == 0,
                zcam_test_utils::DEFAULT_CHECK_INTERVAL,
                zcam_test_utils::DEFAULT_TIMEOUT
            )
            .await
        );
        device.disconnect();

        let written = tokio::time::timeout(Duration::from_secs(5), dumper)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // The held frame is flushed on closure
        assert_eq!(written, 1);
        assert_eq!(std::fs::read(&path).unwrap(), b"only");
    }

    #[tokio::test]
    async fn test_dump_stops_on_signal() {
        let device = MockDevice::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.264");

        let (stop_tx, stop_rx) = watch::channel(false);
        let dumper = tokio::spawn(dump_module(
            camera_for(&device, DeliveryMode::OnNextHeader),
            path,
            Duration::from_millis(20),
            None,
            stop_rx,
        ));

        assert!(
            zcam_test_utils::wait_for_count(
                device.request_counter(),
                2,
                zcam_test_utils::DEFAULT_TIMEOUT
            )
            .await
        );
        stop_tx.send(true).unwrap();

        let written = tokio::time::timeout(Duration::from_secs(5), dumper)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_dump_fails_without_device() {
        let port = zcam_test_utils::find_available_port().await;
        let dir = tempfile::tempdir().unwrap();
        let camera = CameraBuilder::new().ip("127.0.0.1").preview_port(port).build().unwrap();

        let (_stop_tx, stop_rx) = watch::channel(false);
        let result = dump_module(
            camera,
            dir.path().join("frame.264"),
            Duration::from_millis(20),
            None,
            stop_rx,
        )
        .await;

        assert!(result.is_err());
    }
}
