//! Transcoder-based delivery.
//!
//! The external transcoder reads the source audio, encodes it to the
//! device's mu-law format and posts the result to the device itself. This
//! module builds its arguments, supervises the process and turns its
//! diagnostic output into progress samples and a final [`TransmitResult`].

pub mod controller;
pub mod diagnostics;
pub mod handle;
pub mod params;
pub mod result;

use thiserror::Error;

pub use controller::TranscodeProcessController;
pub use diagnostics::{DiagnosticLog, ProgressSample, TelemetrySummary, parse_progress_line};
pub use handle::{Completion, ProgressEvents, TransmissionHandle};
pub use params::{AudioSource, CodecParams, MULAW_128_CONTENT_TYPE};
pub use result::{TERMINATED_EXIT_CODE, TransmitResult, classify_exit};

/// Errors that prevent a transcoder from running at all.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to launch transcoder: {reason}")]
    Launch { reason: String },

    #[error("Invalid transmit target: {reason}")]
    InvalidTarget { reason: String },
}

impl From<TranscodeError> for TransmitResult {
    fn from(error: TranscodeError) -> Self {
        TransmitResult::LaunchError {
            reason: error.to_string(),
        }
    }
}
