//! Centralized configuration for Speakcast.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::device::{Credentials, DeviceEndpoints};
use crate::transcode::CodecParams;
use crate::{Result, SpeakcastError};

/// Central configuration for all Speakcast components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SpeakcastConfig {
    pub device: DeviceConfig,
    pub http: HttpConfig,
    pub transcoder: TranscoderConfig,
    pub delivery: DeliveryMode,
}

/// Target device address, login and endpoint layout.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub credentials: Credentials,
    pub endpoints: DeviceEndpoints,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::new("192.168.0.90", "root", ""),
            endpoints: DeviceEndpoints::default(),
        }
    }
}

/// HTTP client behaviour for direct requests to the device.
///
/// No overall request deadline is imposed by default; the digest
/// round-trip relies on the transport's own timeouts.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout (None = transport default)
    pub request_timeout: Option<Duration>,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            user_agent: "speakcast/0.1.0",
        }
    }
}

/// External transcoder invocation and telemetry handling.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Transcoder executable, resolved through PATH when not absolute
    pub program: PathBuf,
    /// Arguments placed before the argument contract (wrappers such as `nice`)
    pub launcher_args: Vec<String>,
    /// Fixed output codec parameters required by the device
    pub codec: CodecParams,
    /// Buffered progress samples before new ones are dropped
    pub progress_capacity: usize,
    /// Bytes of diagnostic output retained for error reports (tail kept)
    pub diagnostic_capacity: usize,
    /// How long to keep reading diagnostics after the process exits
    pub stderr_drain_timeout: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            launcher_args: Vec::new(),
            codec: CodecParams::default(),
            progress_capacity: 64,
            diagnostic_capacity: 256 * 1024, // 256 KiB
            stderr_drain_timeout: Duration::from_secs(2),
        }
    }
}

/// How a stream is delivered to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Transcode with the external process, which posts to the device itself
    #[default]
    Transcoder,
    /// Upload an already-encoded payload with Digest authentication
    DirectUpload,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcoder" | "process" | "ffmpeg" => Ok(DeliveryMode::Transcoder),
            "direct" | "direct-upload" | "http" => Ok(DeliveryMode::DirectUpload),
            _ => Err(format!("Invalid delivery mode: {s}")),
        }
    }
}

impl SpeakcastConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("SPEAKCAST_HOST") {
            config.device.credentials.host = host;
        }

        if let Ok(username) = std::env::var("SPEAKCAST_USERNAME") {
            config.device.credentials.username = username;
        }

        if let Ok(password) = std::env::var("SPEAKCAST_PASSWORD") {
            config.device.credentials.password = password;
        }

        if let Ok(program) = std::env::var("SPEAKCAST_TRANSCODER") {
            config.transcoder.program = PathBuf::from(program);
        }

        if let Ok(timeout) = std::env::var("SPEAKCAST_HTTP_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http.request_timeout = Some(Duration::from_secs(seconds));
            }
        }

        if let Ok(mode) = std::env::var("SPEAKCAST_DELIVERY") {
            if let Ok(mode) = mode.parse::<DeliveryMode>() {
                config.delivery = mode;
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            http: HttpConfig {
                connect_timeout: Duration::from_secs(2),
                request_timeout: Some(Duration::from_secs(5)),
                ..Default::default()
            },
            transcoder: TranscoderConfig {
                stderr_drain_timeout: Duration::from_millis(200),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Replaces the device credentials, keeping everything else.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.device.credentials = credentials;
        self
    }

    /// Checks settings that would otherwise fail later in confusing ways.
    ///
    /// # Errors
    ///
    /// - `SpeakcastError::Configuration` - empty host or username, or zero channel capacities
    pub fn validate(&self) -> Result<()> {
        let credentials = &self.device.credentials;
        if credentials.host.trim().is_empty() {
            return Err(SpeakcastError::Configuration {
                reason: "device host must not be empty".to_string(),
            });
        }
        if credentials.username.is_empty() {
            return Err(SpeakcastError::Configuration {
                reason: "device username must not be empty".to_string(),
            });
        }
        if self.transcoder.progress_capacity == 0 {
            return Err(SpeakcastError::Configuration {
                reason: "progress_capacity must be greater than 0".to_string(),
            });
        }
        if self.transcoder.diagnostic_capacity == 0 {
            return Err(SpeakcastError::Configuration {
                reason: "diagnostic_capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
