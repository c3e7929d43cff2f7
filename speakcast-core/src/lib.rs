//! Speakcast Core - audio delivery to network speakers
//!
//! This crate streams local audio to an HTTP-attached speaker, either by
//! supervising an external transcoder that posts to the device itself or by
//! uploading pre-encoded audio with Digest authentication. At most one
//! stream runs per session manager.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod delivery;
pub mod device;
pub mod http;
pub mod session;
pub mod tracing_setup;
pub mod transcode;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types for convenient access
pub use auth::{AuthError, DigestAuthenticator, DigestChallenge, DigestCredentialResponse};
pub use bridge::{CommandReply, DeviceBridge};
pub use config::SpeakcastConfig;
pub use delivery::{DeliveryStrategy, DirectUploadDelivery, ProcessDelivery};
pub use device::Credentials;
pub use http::{HttpRequester, RequestError, RequestOutcome};
pub use session::{
    PendingTransmit, SessionState, StopOutcome, StreamSession, StreamSessionManager,
};
pub use transcode::{
    AudioSource, ProgressSample, TranscodeError, TranscodeProcessController, TransmissionHandle,
    TransmitResult,
};

/// Errors that can bubble up from any Speakcast subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SpeakcastError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Transcoder error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpeakcastError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SpeakcastError::Auth(_) => {
                "The device sent an authentication challenge we cannot answer".to_string()
            }
            SpeakcastError::Request(e) => match e {
                RequestError::Transport(_) => "Could not reach the device".to_string(),
                RequestError::HttpStatus { status: 401, .. }
                | RequestError::AuthChallenge(_)
                | RequestError::DigestNotOffered => {
                    "The device rejected the credentials".to_string()
                }
                RequestError::HttpStatus { status, reason } => {
                    format!("The device answered HTTP {status} {reason}")
                }
            },
            SpeakcastError::Transcode(e) => match e {
                TranscodeError::Launch { .. } => {
                    "The transcoder could not be started; is ffmpeg installed?".to_string()
                }
                TranscodeError::InvalidTarget { reason } => {
                    format!("Invalid device address: {reason}")
                }
            },
            SpeakcastError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            SpeakcastError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SpeakcastError::Configuration { .. }
                | SpeakcastError::Transcode(TranscodeError::InvalidTarget { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SpeakcastError>;
