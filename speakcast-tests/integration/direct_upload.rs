//! Direct upload delivery and the front-end bridge against the mock device.

use std::time::Duration;

use speakcast_core::config::DeliveryMode;
use speakcast_core::session::StreamSessionManager;
use speakcast_core::{AudioSource, DeviceBridge, SpeakcastConfig, TransmitResult};
use tempfile::TempDir;
use tokio::time::timeout;

use crate::mock_device::{Behavior, MockDevice};

const DEADLINE: Duration = Duration::from_secs(10);

/// Two seconds of mu-law silence.
fn write_mulaw(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("clip.ul");
    std::fs::write(&path, vec![0xffu8; 16_000]).unwrap();
    path
}

fn direct_config(device: &MockDevice) -> SpeakcastConfig {
    let mut config = SpeakcastConfig::for_testing().with_credentials(device.credentials());
    config.delivery = DeliveryMode::DirectUpload;
    config
}

#[tokio::test]
async fn test_direct_upload_posts_file_unchanged() {
    let device = MockDevice::start(Behavior::Digest).await;
    let dir = TempDir::new().unwrap();
    let clip = write_mulaw(&dir);
    let mut manager = StreamSessionManager::from_config(&direct_config(&device)).unwrap();
    assert_eq!(manager.delivery_label(), "direct-upload");

    let result = timeout(DEADLINE, manager.start(AudioSource::file(&clip)))
        .await
        .unwrap();

    match result {
        TransmitResult::Success { size, duration, .. } => {
            assert_eq!(size, "16kB");
            assert_eq!(duration, "00:00:02.00");
        }
        other => panic!("expected success, got {other:?}"),
    }
    let bodies = device.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].content_type.as_deref(), Some("audio/basic"));
    assert_eq!(bodies[0].body.len(), 16_000);
}

#[tokio::test]
async fn test_rejected_upload_is_delivery_error() {
    let device = MockDevice::start(Behavior::AlwaysChallenge).await;
    let dir = TempDir::new().unwrap();
    let clip = write_mulaw(&dir);
    let mut manager = StreamSessionManager::from_config(&direct_config(&device)).unwrap();

    let result = timeout(DEADLINE, manager.start(AudioSource::file(&clip)))
        .await
        .unwrap();

    assert!(matches!(
        result,
        TransmitResult::DeliveryError {
            status: Some(401),
            ..
        }
    ));
    assert_eq!(device.requests(), 2);
}

#[tokio::test]
async fn test_missing_file_is_reported_without_request() {
    let device = MockDevice::start(Behavior::Digest).await;
    let mut manager = StreamSessionManager::from_config(&direct_config(&device)).unwrap();

    let result = timeout(DEADLINE, manager.start(AudioSource::file("/nonexistent/clip.ul")))
        .await
        .unwrap();

    assert!(matches!(result, TransmitResult::LaunchError { .. }));
    assert_eq!(device.requests(), 0);
}

#[tokio::test]
async fn test_bridge_round_trip_with_direct_upload() {
    let device = MockDevice::start(Behavior::Digest).await;
    let dir = TempDir::new().unwrap();
    let clip = write_mulaw(&dir);

    let mut base = SpeakcastConfig::for_testing();
    base.delivery = DeliveryMode::DirectUpload;
    let mut bridge = DeviceBridge::new(base);

    assert!(!bridge.test_connection().await.success);
    assert!(bridge.init(device.credentials()).success);

    let probe = bridge.test_connection().await;
    assert!(probe.success);
    assert_eq!(probe.status, Some(200));
    assert!(probe.data.as_deref().is_some_and(|data| data.contains("g711")));

    let reply = timeout(DEADLINE, bridge.stream_file(&clip)).await.unwrap();
    assert!(reply.success);
    assert_eq!(reply.size.as_deref(), Some("16kB"));
    assert!(!bridge.is_streaming());

    let stop = bridge.stop();
    assert!(!stop.success);
    assert_eq!(stop.message.as_deref(), Some("No active stream"));
}

#[tokio::test]
async fn test_tone_is_refused_by_direct_upload() {
    let device = MockDevice::start(Behavior::Digest).await;
    let mut manager = StreamSessionManager::from_config(&direct_config(&device)).unwrap();

    let result = timeout(DEADLINE, manager.start(AudioSource::beep(Duration::from_secs(1))))
        .await
        .unwrap();

    assert!(matches!(result, TransmitResult::LaunchError { .. }));
    assert_eq!(device.requests(), 0);
}
