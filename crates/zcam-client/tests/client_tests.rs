//! Preview Client Tests (zcam-client)
//!
//! Runs the preview client against a mock camera module:
//! - Connection lifecycle (open, double open, closure, re-open)
//! - Flow control (explicit requests, follow-up requests, pacing)
//! - Frame delivery in both delivery modes
//! - Independence of several modules

use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};
use zcam_client::{
    event_channel, CameraBuilder, ClientError, DeliveryMode, Frame, PreviewClient, PreviewConfig,
    StreamEvent,
};
use zcam_test_utils::{
    find_available_port, wait_for, wait_for_count, MockDevice, DEFAULT_CHECK_INTERVAL,
    DEFAULT_TIMEOUT,
};

fn client_for(device: &MockDevice, delivery: DeliveryMode) -> PreviewClient {
    let config = PreviewConfig {
        delivery,
        ..PreviewConfig::default()
    };
    PreviewClient::with_config(device.host(), device.port(), config)
}

async fn next_event(rx: &mut UnboundedReceiver<StreamEvent>) -> StreamEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for stream event")
        .expect("event channel closed")
}

async fn next_frame(rx: &mut UnboundedReceiver<StreamEvent>) -> Frame {
    match next_event(rx).await {
        StreamEvent::Frame(frame) => frame,
        other => panic!("Expected frame, got {:?}", other),
    }
}

async fn expect_closed(rx: &mut UnboundedReceiver<StreamEvent>) -> Option<String> {
    match next_event(rx).await {
        StreamEvent::Closed { reason } => reason,
        other => panic!("Expected close event, got {:?}", other),
    }
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

#[tokio::test]
async fn test_request_before_open_fails() {
    let device = MockDevice::start(vec![b"unused".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnNextHeader);

    assert!(matches!(client.request_frame(), Err(ClientError::NotConnected)));
    assert!(matches!(
        client.write(Bytes::from_static(b"\x01")),
        Err(ClientError::NotConnected)
    ));
    assert!(!client.is_connected());
    assert_eq!(device.connections(), 0);
    assert_eq!(device.requests(), 0);
}

#[tokio::test]
async fn test_open_connection_refused() {
    let port = find_available_port().await;
    let client = PreviewClient::new("127.0.0.1", port);
    let (sink, _rx) = event_channel();

    assert!(matches!(
        client.open(sink).await,
        Err(ClientError::ConnectionFailed(_))
    ));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_open_twice_rejected() {
    let device = MockDevice::start(vec![b"frame".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.expect("first open failed");

    let (second_sink, _second_rx) = event_channel();
    assert!(matches!(
        client.open(second_sink).await,
        Err(ClientError::AlreadyConnected)
    ));

    // First connection untouched
    assert!(client.is_connected());
    client.request_frame().expect("request on first connection");
    assert_eq!(next_frame(&mut rx).await.as_ref(), b"frame");
    assert_eq!(device.connections(), 1);
}

#[tokio::test]
async fn test_reopen_after_remote_close() {
    let device = MockDevice::start(vec![b"one".to_vec(), b"two".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();
    assert!(wait_for(|| device.connections() == 1, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT).await);

    device.disconnect();
    assert_eq!(expect_closed(&mut rx).await, None);
    assert!(!client.is_connected());

    let (sink, mut rx) = event_channel();
    client.open(sink).await.expect("re-open after closure");
    client.request_frame().unwrap();

    assert_eq!(next_frame(&mut rx).await.as_ref(), b"one");
    assert_eq!(device.connections(), 2);
}

#[tokio::test]
async fn test_local_close_reports_closed() {
    let device = MockDevice::start(vec![]).await;
    let client = client_for(&device, DeliveryMode::OnNextHeader);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();

    client.close().await.unwrap();
    assert!(!client.is_connected());
    assert!(matches!(client.request_frame(), Err(ClientError::NotConnected)));
    assert_eq!(expect_closed(&mut rx).await.as_deref(), Some("closed locally"));

    let (sink, _rx) = event_channel();
    client.open(sink).await.expect("re-open after local close");
}

// ============================================================================
// Frame Delivery
// ============================================================================

#[tokio::test]
async fn test_next_header_delivery_order() {
    let device = MockDevice::start(vec![b"first".to_vec(), b"second".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnNextHeader);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();

    client.request_frame().unwrap();
    // The first header flushes the (empty) initial accumulator
    assert!(next_frame(&mut rx).await.is_empty());

    client.request_frame().unwrap();
    assert_eq!(next_frame(&mut rx).await.as_ref(), b"first");

    // "second" is complete but held until closure flushes it
    assert!(wait_for_count(device.request_counter(), 2, DEFAULT_TIMEOUT).await);
    assert!(wait_for(|| device.pending_frames() == 0, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT).await);
    device.disconnect();

    assert_eq!(next_frame(&mut rx).await.as_ref(), b"second");
    assert_eq!(expect_closed(&mut rx).await, None);

    let stats = client.stats();
    assert_eq!(stats.frames, 3);
    assert_eq!(stats.bytes, 11);
    assert_eq!(stats.anomalies, 0);
}

#[tokio::test]
async fn test_completion_delivery() {
    let device = MockDevice::start(vec![b"alpha".to_vec(), Vec::new(), b"gamma".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();

    client.request_frame().unwrap();
    assert_eq!(next_frame(&mut rx).await.as_ref(), b"alpha");

    client.request_frame().unwrap();
    assert!(next_frame(&mut rx).await.is_empty());

    client.request_frame().unwrap();
    assert_eq!(next_frame(&mut rx).await.as_ref(), b"gamma");
}

#[tokio::test]
async fn test_large_frame_across_reads() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let device = MockDevice::start(vec![payload.clone()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();
    client.request_frame().unwrap();

    let frame = next_frame(&mut rx).await;
    assert_eq!(frame.len(), payload.len());
    assert_eq!(frame.as_ref(), payload.as_slice());
}

// ============================================================================
// Flow Control
// ============================================================================

#[tokio::test]
async fn test_short_read_sends_one_follow_up_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (proceed_tx, proceed_rx) = tokio::sync::oneshot::channel::<()>();

    let device = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.set_nodelay(true).unwrap();

        stream.write_all(&10u32.to_be_bytes()).await.unwrap();
        sleep(Duration::from_millis(30)).await;
        stream.write_all(b"abcd").await.unwrap();

        // Exactly one follow-up request for the short read
        let mut request = [0u8; 1];
        stream.read_exact(&mut request).await.unwrap();
        proceed_rx.await.unwrap();

        stream.write_all(b"efghij").await.unwrap();
        sleep(Duration::from_millis(30)).await;

        let mut extra = [0u8; 8];
        let extra_len = timeout(Duration::from_millis(200), stream.read(&mut extra))
            .await
            .map(|r| r.unwrap())
            .unwrap_or(0);
        (request[0], extra_len)
    });

    let client = PreviewClient::with_config(
        "127.0.0.1",
        port,
        PreviewConfig {
            delivery: DeliveryMode::OnCompletion,
            ..PreviewConfig::default()
        },
    );
    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();

    assert!(
        wait_for(
            || client.stats().follow_up_requests == 1,
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT
        )
        .await
    );
    proceed_tx.send(()).unwrap();

    assert_eq!(next_frame(&mut rx).await.as_ref(), b"abcdefghij");

    let (request, extra_len) = device.await.unwrap();
    assert_eq!(request, 0x01);
    assert_eq!(extra_len, 0, "no request once the frame completed");
    assert_eq!(client.stats().follow_up_requests, 1);
}

#[tokio::test]
async fn test_garbage_chunk_triggers_recovery_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let device = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"noise").await.unwrap();

        let mut request = [0u8; 1];
        stream.read_exact(&mut request).await.unwrap();

        stream.write_all(&2u32.to_be_bytes()).await.unwrap();
        sleep(Duration::from_millis(30)).await;
        stream.write_all(b"ok").await.unwrap();
        sleep(Duration::from_millis(30)).await;
        request[0]
    });

    let client = PreviewClient::with_config(
        "127.0.0.1",
        port,
        PreviewConfig {
            delivery: DeliveryMode::OnCompletion,
            ..PreviewConfig::default()
        },
    );
    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();

    assert_eq!(next_frame(&mut rx).await.as_ref(), b"ok");
    assert_eq!(device.await.unwrap(), 0x01);
    assert_eq!(client.stats().anomalies, 1);
}

#[tokio::test]
async fn test_pacer_drives_stream_and_stops_on_close() {
    let device = MockDevice::start(vec![b"f1".to_vec(), b"f2".to_vec(), b"f3".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();
    let pacer = client.flow_controller().pace(Duration::from_millis(25));

    for expected in [b"f1", b"f2", b"f3"] {
        assert_eq!(next_frame(&mut rx).await.as_ref(), expected);
    }

    device.disconnect();
    assert_eq!(expect_closed(&mut rx).await, None);

    timeout(Duration::from_secs(2), pacer)
        .await
        .expect("pacer did not stop after closure")
        .unwrap();
}

#[tokio::test]
async fn test_pacer_with_zero_interval_keeps_requesting() {
    let device = MockDevice::start(vec![b"z1".to_vec(), b"z2".to_vec()]).await;
    let client = client_for(&device, DeliveryMode::OnCompletion);

    let (sink, mut rx) = event_channel();
    client.open(sink).await.unwrap();
    let pacer = client.flow_controller().pace(Duration::ZERO);

    assert_eq!(next_frame(&mut rx).await.as_ref(), b"z1");
    assert_eq!(next_frame(&mut rx).await.as_ref(), b"z2");
    assert!(!pacer.is_finished());

    client.close().await.unwrap();
    timeout(Duration::from_secs(2), pacer)
        .await
        .expect("pacer did not stop after close")
        .expect("pacer task panicked");
}

// ============================================================================
// Multiple Modules
// ============================================================================

#[tokio::test]
async fn test_modules_are_independent() {
    let device_a = MockDevice::start(vec![b"from-a".to_vec()]).await;
    let device_b = MockDevice::start(vec![b"from-b".to_vec()]).await;

    let camera_a = CameraBuilder::new()
        .ip(device_a.host())
        .preview_port(device_a.port())
        .delivery(DeliveryMode::OnCompletion)
        .build()
        .unwrap();
    let camera_b = CameraBuilder::new()
        .ip(device_b.host())
        .preview_port(device_b.port())
        .delivery(DeliveryMode::OnCompletion)
        .build()
        .unwrap();

    let (sink_a, mut rx_a) = event_channel();
    let (sink_b, mut rx_b) = event_channel();
    camera_a.preview().open(sink_a).await.unwrap();
    camera_b.preview().open(sink_b).await.unwrap();

    camera_a.preview().request_frame().unwrap();
    camera_b.preview().request_frame().unwrap();

    assert_eq!(next_frame(&mut rx_a).await.as_ref(), b"from-a");
    assert_eq!(next_frame(&mut rx_b).await.as_ref(), b"from-b");

    // Closing one module leaves the other streaming
    camera_a.preview().close().await.unwrap();
    assert!(expect_closed(&mut rx_a).await.is_some());
    assert!(camera_b.preview().is_connected());
    camera_b.preview().request_frame().unwrap();
    assert!(wait_for_count(device_b.request_counter(), 2, DEFAULT_TIMEOUT).await);
    assert_eq!(device_a.requests(), 1);
}
