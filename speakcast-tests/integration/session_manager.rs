//! Session manager behaviour with real (fake) transcoder processes.

#![cfg(unix)]

use std::time::Duration;

use speakcast_core::config::TranscoderConfig;
use speakcast_core::device::Credentials;
use speakcast_core::session::{SessionState, StreamSessionManager};
use speakcast_core::test_utils::FakeTranscoder;
use speakcast_core::{AudioSource, SpeakcastConfig, TransmitResult};
use tokio::time::timeout;

use crate::mock_device::{Behavior, MockDevice};

const DEADLINE: Duration = Duration::from_secs(10);

fn manager(credentials: Credentials, transcoder: TranscoderConfig) -> StreamSessionManager {
    let mut config = SpeakcastConfig::for_testing().with_credentials(credentials);
    config.transcoder = transcoder;
    StreamSessionManager::from_config(&config).unwrap()
}

fn unreachable_device() -> Credentials {
    Credentials::new("127.0.0.1:9", "root", "pass")
}

#[tokio::test]
async fn test_second_start_leaves_exactly_one_running_stream() {
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(unreachable_device(), fake.hanging().unwrap());

    let first = manager.start(AudioSource::file("one.mp3"));
    let first_pid = manager.current_session().and_then(|s| s.pid);
    let second = manager.start(AudioSource::file("two.mp3"));

    assert!(manager.is_streaming());
    let current = manager.current_session().unwrap();
    assert_eq!(current.generation, second.generation());
    assert_ne!(current.pid, first_pid);

    // The replaced stream was told to stop and resolves on its own.
    let first_result = timeout(DEADLINE, first).await.unwrap();
    assert_eq!(first_result, TransmitResult::StoppedByUser);
    assert!(manager.is_streaming());
    assert_eq!(second.try_result(), None);

    assert!(manager.stop().success);
    let second_result = timeout(DEADLINE, second).await.unwrap();
    assert_eq!(second_result, TransmitResult::StoppedByUser);
    assert!(!manager.is_streaming());
}

#[tokio::test]
async fn test_stop_when_idle_reports_no_active_stream() {
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(unreachable_device(), fake.hanging().unwrap());

    let outcome = manager.stop();

    assert!(!outcome.success);
    assert_eq!(outcome.message, "No active stream");
}

#[tokio::test]
async fn test_natural_completion_returns_to_idle() {
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(unreachable_device(), fake.succeeding().unwrap());

    let pending = manager.start(AudioSource::file("song.mp3"));
    let result = timeout(DEADLINE, pending).await.unwrap();

    assert!(result.is_success());
    assert!(!manager.is_streaming());
    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.last_result(), Some(result.clone()));
    assert_eq!(
        manager.last_session().map(|s| s.state),
        Some(SessionState::Completed)
    );

    assert_eq!(manager.reap(), Some(result.clone()));
    assert_eq!(manager.last_result(), Some(result));
    assert!(!manager.stop().success);
}

#[tokio::test]
async fn test_process_failure_is_recorded() {
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(unreachable_device(), fake.failing().unwrap());

    let result = timeout(DEADLINE, manager.start(AudioSource::file("broken.mp3")))
        .await
        .unwrap();

    assert!(matches!(
        result,
        TransmitResult::ProcessError {
            exit_code: Some(1),
            ..
        }
    ));
    assert_eq!(
        manager.last_session().map(|s| s.state),
        Some(SessionState::Failed)
    );
}

#[tokio::test]
async fn test_connection_probe_during_stream() {
    let device = MockDevice::start(Behavior::Digest).await;
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(device.credentials(), fake.hanging().unwrap());

    let pending = manager.start(AudioSource::beep(Duration::from_secs(30)));
    let outcome = manager.test_connection().await;

    assert!(outcome.is_success());
    assert!(manager.is_streaming());

    manager.stop();
    let result = timeout(DEADLINE, pending).await.unwrap();
    assert_eq!(result, TransmitResult::StoppedByUser);
}

#[tokio::test]
async fn test_progress_reaches_subscriber() {
    let fake = FakeTranscoder::new().unwrap();
    let mut manager = manager(unreachable_device(), fake.succeeding().unwrap());

    let mut pending = manager.start(AudioSource::file("song.mp3"));
    let mut progress = pending.take_progress().unwrap();

    let mut last = None;
    while let Some(sample) = timeout(DEADLINE, progress.next_sample()).await.unwrap() {
        last = Some(sample);
    }

    assert_eq!(last.map(|s| s.elapsed), Some(Duration::from_secs(5)));
    assert!(timeout(DEADLINE, pending).await.unwrap().is_success());
}
