//! Digest request/retry behaviour against the mock device.

use bytes::Bytes;
use speakcast_core::config::HttpConfig;
use speakcast_core::device::{Credentials, DEFAULT_PROBE_PATH, DeviceEndpoints};
use speakcast_core::http::{HttpRequester, RequestOutcome};

use crate::mock_device::{Behavior, MockDevice, PROBE_BODY};

fn requester(credentials: Credentials) -> HttpRequester {
    HttpRequester::new(credentials, DeviceEndpoints::default(), &HttpConfig::default()).unwrap()
}

#[tokio::test]
async fn test_probe_succeeds_after_one_challenge() {
    let device = MockDevice::start(Behavior::Digest).await;

    let outcome = requester(device.credentials()).test_connection().await;

    assert_eq!(
        outcome,
        RequestOutcome::Success {
            status: 200,
            body: PROBE_BODY.to_string(),
        }
    );
    assert_eq!(device.requests(), 2);
    assert_eq!(device.authorized_requests(), 1);
    assert_eq!(device.bodies()[0].path, DEFAULT_PROBE_PATH);
}

#[tokio::test]
async fn test_repeated_challenge_is_final_after_one_retry() {
    let device = MockDevice::start(Behavior::AlwaysChallenge).await;

    let outcome = requester(device.credentials()).test_connection().await;

    assert_eq!(outcome.status(), Some(401));
    assert!(!outcome.is_success());
    assert_eq!(device.requests(), 2);
    assert_eq!(device.authorized_requests(), 1);
}

#[tokio::test]
async fn test_wrong_password_fails_after_one_retry() {
    let device = MockDevice::start(Behavior::Digest).await;
    let mut credentials = device.credentials();
    credentials.password = "wrong".to_string();

    let outcome = requester(credentials).test_connection().await;

    assert_eq!(outcome.status(), Some(401));
    assert_eq!(device.requests(), 2);
    assert_eq!(device.authorized_requests(), 0);
}

#[tokio::test]
async fn test_basic_only_challenge_is_not_retried() {
    let device = MockDevice::start(Behavior::BasicOnly).await;

    let outcome = requester(device.credentials()).test_connection().await;

    match outcome {
        RequestOutcome::Failure { status, message } => {
            assert_eq!(status, Some(401));
            assert!(message.contains("Digest"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(device.requests(), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let device = MockDevice::start(Behavior::Status(500)).await;

    let outcome = requester(device.credentials()).test_connection().await;

    assert_eq!(outcome.status(), Some(500));
    assert_eq!(device.requests(), 1);
}

#[tokio::test]
async fn test_upload_body_survives_authenticated_retry() {
    let device = MockDevice::start(Behavior::Digest).await;
    let payload = Bytes::from_static(&[0xff, 0x7f, 0x00, 0x80, 0xff]);

    let outcome = requester(device.credentials())
        .upload_raw(payload.clone())
        .await;

    assert!(outcome.is_success());
    let bodies = device.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].path, "/axis-cgi/audio/transmit.cgi");
    assert_eq!(bodies[0].content_type.as_deref(), Some("audio/basic"));
    assert_eq!(bodies[0].body, payload);
}

#[tokio::test]
async fn test_independent_requests_may_run_concurrently() {
    let device = MockDevice::start(Behavior::Digest).await;
    let requester = requester(device.credentials());

    let (first, second) = tokio::join!(requester.test_connection(), requester.test_connection());

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(device.requests(), 4);
}
