//! Transcoder argument contract.
//!
//! The device only accepts 8-bit mu-law PCM, mono, 16 kHz, in a WAV
//! container, posted as a `Content-Length`-bounded body. The arguments
//! below encode exactly that and nothing else.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Device-specific MIME token announcing mu-law at 128 kbit/s.
pub const MULAW_128_CONTENT_TYPE: &str = "audio/axis-mulaw-128";

/// Fixed output parameters handed to the transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParams {
    /// Audio codec name, e.g. `pcm_mulaw`
    pub codec: String,
    /// Audio bitrate, e.g. `128k`
    pub bitrate: String,
    pub channels: u8,
    pub sample_rate: u32,
    /// Output container format
    pub container: String,
    /// Content type announced on the outgoing POST
    pub content_type: String,
    /// Input probing budget in bytes
    pub probe_size: u32,
    /// Input analysis budget in microseconds
    pub analyze_duration: u32,
    /// Chunked transfer encoding for the outgoing POST; the device rejects it
    pub chunked_post: bool,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            codec: "pcm_mulaw".to_string(),
            bitrate: "128k".to_string(),
            channels: 1,
            sample_rate: 16_000,
            container: "wav".to_string(),
            content_type: MULAW_128_CONTENT_TYPE.to_string(),
            probe_size: 32,
            analyze_duration: 32,
            chunked_post: false,
        }
    }
}

/// What gets played on the device.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Any audio file the transcoder can decode
    File(PathBuf),
    /// Generated sine tone, used as an audible connectivity check
    TestTone {
        frequency_hz: u32,
        duration: Duration,
    },
}

impl AudioSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AudioSource::File(path.into())
    }

    /// The 1 kHz beep used for audible connection tests.
    pub fn beep(duration: Duration) -> Self {
        AudioSource::TestTone {
            frequency_hz: 1000,
            duration,
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(path) => match path.file_name() {
                Some(name) => write!(f, "{}", name.to_string_lossy()),
                None => write!(f, "{}", path.display()),
            },
            AudioSource::TestTone {
                frequency_hz,
                duration,
            } => write!(
                f,
                "{frequency_hz} Hz tone ({:.1}s)",
                duration.as_secs_f64()
            ),
        }
    }
}

impl CodecParams {
    /// Builds the full argument list for one invocation.
    pub fn build_args(&self, source: &AudioSource, target: &Url) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(28);

        match source {
            AudioSource::File(path) => {
                args.push("-i".into());
                args.push(path.clone().into_os_string());
                args.extend([
                    "-probesize".into(),
                    self.probe_size.to_string().into(),
                    "-analyzeduration".into(),
                    self.analyze_duration.to_string().into(),
                ]);
            }
            AudioSource::TestTone {
                frequency_hz,
                duration,
            } => {
                args.extend([
                    "-f".into(),
                    "lavfi".into(),
                    "-i".into(),
                    format!(
                        "sine=frequency={frequency_hz}:duration={}",
                        format_seconds(*duration)
                    )
                    .into(),
                ]);
            }
        }

        args.extend(
            [
                "-c:a".to_string(),
                self.codec.clone(),
                "-ab".to_string(),
                self.bitrate.clone(),
                "-ac".to_string(),
                self.channels.to_string(),
                "-ar".to_string(),
                self.sample_rate.to_string(),
                "-f".to_string(),
                self.container.clone(),
                "-chunked_post".to_string(),
                if self.chunked_post { "1" } else { "0" }.to_string(),
                "-content_type".to_string(),
                self.content_type.clone(),
                target.to_string(),
            ]
            .map(OsString::from),
        );

        args
    }
}

/// Whole seconds without a fraction, otherwise up to millisecond precision.
fn format_seconds(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}
