//! Operations exposed to a user interface.
//!
//! Every call answers with a [`CommandReply`], a flat record with a
//! `success` flag, so a front end can forward it as JSON without matching
//! on Rust error types. Expected failures never escape as `Err`.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SpeakcastConfig;
use crate::device::Credentials;
use crate::http::RequestOutcome;
use crate::session::{PendingTransmit, StopOutcome, StreamSessionManager};
use crate::transcode::{AudioSource, TransmitResult};

const NOT_INITIALIZED: &str = "Streamer not initialized";

/// Flat reply record; absent fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CommandReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn not_initialized() -> Self {
        Self::failure(NOT_INITIALIZED)
    }
}

impl From<RequestOutcome> for CommandReply {
    fn from(outcome: RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Success { status, body } => Self {
                success: true,
                status: Some(status),
                data: Some(body),
                ..Default::default()
            },
            RequestOutcome::Failure { status, message } => Self {
                status,
                ..Self::failure(message)
            },
        }
    }
}

impl From<TransmitResult> for CommandReply {
    fn from(result: TransmitResult) -> Self {
        match result {
            TransmitResult::Success {
                size,
                duration,
                speed,
            } => Self {
                success: true,
                size: Some(size),
                duration: Some(duration),
                speed: Some(speed),
                ..Default::default()
            },
            TransmitResult::StoppedByUser => Self {
                success: false,
                stopped: Some(true),
                message: Some("Stream stopped".to_string()),
                ..Default::default()
            },
            TransmitResult::ProcessError {
                exit_code,
                diagnostic_text,
            } => Self {
                stderr: Some(diagnostic_text),
                ..Self::failure(match exit_code {
                    Some(code) => format!("Transcoder exit code {code}"),
                    None => "Transcoder exited abnormally".to_string(),
                })
            },
            TransmitResult::LaunchError { reason } => Self::failure(reason),
            TransmitResult::DeliveryError { status, message } => Self {
                status,
                ..Self::failure(message)
            },
        }
    }
}

impl From<StopOutcome> for CommandReply {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            success: outcome.success,
            message: Some(outcome.message),
            ..Default::default()
        }
    }
}

/// Front-end facing wrapper around an optional session manager.
///
/// `init` may be called again at any time to retarget another device; the
/// previous manager and any stream it owns are dropped, which stops it.
#[derive(Debug, Default)]
pub struct DeviceBridge {
    base: SpeakcastConfig,
    manager: Option<StreamSessionManager>,
}

impl DeviceBridge {
    /// Bridge whose managers inherit everything but credentials from `base`.
    pub fn new(base: SpeakcastConfig) -> Self {
        Self {
            base,
            manager: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.manager.is_some()
    }

    pub fn manager(&self) -> Option<&StreamSessionManager> {
        self.manager.as_ref()
    }

    /// Creates a session manager for `credentials`.
    pub fn init(&mut self, credentials: Credentials) -> CommandReply {
        let config = self.base.clone().with_credentials(credentials);
        self.manager = None;
        match StreamSessionManager::from_config(&config) {
            Ok(manager) => {
                info!("Streamer initialized for {}", config.device.credentials.host);
                self.manager = Some(manager);
                CommandReply::ok()
            }
            Err(e) => {
                warn!("Streamer initialization failed: {}", e);
                CommandReply::failure(e.user_message())
            }
        }
    }

    pub async fn test_connection(&self) -> CommandReply {
        match &self.manager {
            Some(manager) => manager.test_connection().await.into(),
            None => CommandReply::not_initialized(),
        }
    }

    /// Starts streaming a file; the returned future resolves when it ends.
    pub fn stream_file(&mut self, path: impl Into<PathBuf>) -> BoxFuture<'static, CommandReply> {
        self.start(AudioSource::file(path))
    }

    /// Plays the 1 kHz test beep through the streaming path.
    pub fn play_test_tone(&mut self, duration: Duration) -> BoxFuture<'static, CommandReply> {
        self.start(AudioSource::beep(duration))
    }

    pub fn stop(&mut self) -> CommandReply {
        match &mut self.manager {
            Some(manager) => manager.stop().into(),
            None => CommandReply::not_initialized(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.manager
            .as_ref()
            .is_some_and(StreamSessionManager::is_streaming)
    }

    pub async fn upload_raw(&self, payload: Bytes) -> CommandReply {
        match &self.manager {
            Some(manager) => manager.upload_raw(payload).await.into(),
            None => CommandReply::not_initialized(),
        }
    }

    fn start(&mut self, source: AudioSource) -> BoxFuture<'static, CommandReply> {
        let Some(manager) = self.manager.as_mut() else {
            return futures::future::ready(CommandReply::not_initialized()).boxed();
        };
        let pending: PendingTransmit = manager.start(source);
        pending.wait().map(CommandReply::from).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_before_init_report_not_initialized() {
        let mut bridge = DeviceBridge::default();

        assert_eq!(bridge.stop(), CommandReply::not_initialized());
        assert_eq!(bridge.test_connection().await, CommandReply::not_initialized());
        assert_eq!(
            bridge.stream_file("song.mp3").await,
            CommandReply::not_initialized()
        );
        assert!(!bridge.is_streaming());
    }

    #[tokio::test]
    async fn test_init_rejects_empty_host() {
        let mut bridge = DeviceBridge::new(SpeakcastConfig::for_testing());
        let reply = bridge.init(Credentials::new("", "root", "pass"));

        assert!(!reply.success);
        assert!(!bridge.is_initialized());
    }

    #[tokio::test]
    async fn test_stop_after_init_without_stream() {
        let mut bridge = DeviceBridge::new(SpeakcastConfig::for_testing());
        assert!(bridge.init(Credentials::new("10.0.0.5", "root", "pass")).success);

        let reply = bridge.stop();
        assert!(!reply.success);
        assert_eq!(reply.message.as_deref(), Some("No active stream"));
    }

    #[test]
    fn test_process_error_reply_carries_stderr() {
        let reply = CommandReply::from(TransmitResult::ProcessError {
            exit_code: Some(1),
            diagnostic_text: "Invalid data found".to_string(),
        });

        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("Transcoder exit code 1"));
        assert_eq!(reply.stderr.as_deref(), Some("Invalid data found"));
    }

    #[test]
    fn test_stopped_reply_shape() {
        let json = serde_json::to_value(CommandReply::from(TransmitResult::StoppedByUser)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "Stream stopped",
                "stopped": true
            })
        );
    }

    #[test]
    fn test_probe_reply_carries_body() {
        let reply = CommandReply::from(RequestOutcome::Success {
            status: 200,
            body: "root.Properties.Audio.Decoder.Format=g711".to_string(),
        });
        assert!(reply.success);
        assert_eq!(reply.status, Some(200));
        assert!(reply.data.unwrap().contains("g711"));
    }
}
