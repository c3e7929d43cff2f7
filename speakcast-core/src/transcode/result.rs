//! Final outcome of one transmission attempt.

use serde::Serialize;

use super::diagnostics::DiagnosticLog;

/// Exit code the transcoder uses after handling a termination signal.
pub const TERMINATED_EXIT_CODE: i32 = 255;

/// Placeholder for telemetry fields the diagnostic stream never reported.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Tagged outcome of one stream.
///
/// `Success` and `StoppedByUser` are normal endings; the other variants are
/// failures carrying enough context for an operator to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransmitResult {
    Success {
        size: String,
        duration: String,
        speed: String,
    },
    StoppedByUser,
    ProcessError {
        exit_code: Option<i32>,
        diagnostic_text: String,
    },
    LaunchError {
        reason: String,
    },
    /// The device refused a direct upload
    DeliveryError {
        status: Option<u16>,
        message: String,
    },
}

impl TransmitResult {
    /// Success with every telemetry field set to `"unknown"`.
    pub fn success_without_telemetry() -> Self {
        TransmitResult::Success {
            size: UNKNOWN_LABEL.to_string(),
            duration: UNKNOWN_LABEL.to_string(),
            speed: UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransmitResult::Success { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransmitResult::StoppedByUser)
    }

    /// True for outcomes that should be reported as a rejection.
    pub fn is_failure(&self) -> bool {
        !(self.is_success() || self.is_stopped())
    }

    /// Short human-readable summary.
    pub fn describe(&self) -> String {
        match self {
            TransmitResult::Success {
                size,
                duration,
                speed,
            } => format!("Stream completed (size {size}, duration {duration}, speed {speed})"),
            TransmitResult::StoppedByUser => "Stream stopped".to_string(),
            TransmitResult::ProcessError {
                exit_code: Some(code),
                ..
            } => format!("Transcoder exited with code {code}"),
            TransmitResult::ProcessError {
                exit_code: None, ..
            } => "Transcoder exited abnormally".to_string(),
            TransmitResult::LaunchError { reason } => {
                format!("Failed to start transcoder: {reason}")
            }
            TransmitResult::DeliveryError {
                status: Some(status),
                message,
            } => format!("Upload rejected with HTTP {status}: {message}"),
            TransmitResult::DeliveryError {
                status: None,
                message,
            } => format!("Upload failed: {message}"),
        }
    }
}

/// Maps a transcoder exit into a result.
///
/// `code` is `None` when the process was killed by a signal. Since the
/// controller is the only sender of termination signals, both that case and
/// the transcoder's own termination code count as a user stop. Any other
/// non-zero code is a process error unless a stop had been requested.
pub fn classify_exit(code: Option<i32>, stop_requested: bool, log: &DiagnosticLog) -> TransmitResult {
    match code {
        Some(0) => {
            let summary = log.summary();
            let label = |value: &Option<String>| {
                value.clone().unwrap_or_else(|| UNKNOWN_LABEL.to_string())
            };
            TransmitResult::Success {
                size: label(&summary.size),
                duration: label(&summary.time),
                speed: label(&summary.speed),
            }
        }
        None | Some(TERMINATED_EXIT_CODE) => TransmitResult::StoppedByUser,
        Some(_) if stop_requested => TransmitResult::StoppedByUser,
        Some(code) => TransmitResult::ProcessError {
            exit_code: Some(code),
            diagnostic_text: log.text().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(lines: &[&str]) -> DiagnosticLog {
        let mut log = DiagnosticLog::new(4096);
        for line in lines {
            log.record_line(line);
        }
        log
    }

    #[test]
    fn test_clean_exit_uses_last_telemetry() {
        let log = log_with(&[
            "size=  128kB time=00:00:02.00 bitrate= 128.0kbits/s speed=1.0x",
            "size=  256kB time=00:00:04.00 bitrate= 128.0kbits/s speed=1.1x",
        ]);

        assert_eq!(
            classify_exit(Some(0), false, &log),
            TransmitResult::Success {
                size: "256kB".to_string(),
                duration: "00:00:04.00".to_string(),
                speed: "1.1x".to_string(),
            }
        );
    }

    #[test]
    fn test_clean_exit_without_telemetry_is_still_success() {
        let result = classify_exit(Some(0), false, &log_with(&[]));
        assert_eq!(result, TransmitResult::success_without_telemetry());
    }

    #[test]
    fn test_termination_code_after_stop_is_user_stop() {
        let result = classify_exit(Some(255), true, &log_with(&["Exiting normally, received signal 15."]));
        assert_eq!(result, TransmitResult::StoppedByUser);
        assert!(!result.is_failure());
    }

    #[test]
    fn test_signal_exit_is_user_stop() {
        assert_eq!(classify_exit(None, false, &log_with(&[])), TransmitResult::StoppedByUser);
    }

    #[test]
    fn test_failure_code_without_stop_keeps_diagnostics() {
        let log = log_with(&["song.mp3: No such file or directory"]);
        let result = classify_exit(Some(1), false, &log);

        assert_eq!(
            result,
            TransmitResult::ProcessError {
                exit_code: Some(1),
                diagnostic_text: "song.mp3: No such file or directory\n".to_string(),
            }
        );
        assert!(result.is_failure());
    }

    #[test]
    fn test_failure_code_after_stop_is_user_stop() {
        assert_eq!(
            classify_exit(Some(1), true, &log_with(&[])),
            TransmitResult::StoppedByUser
        );
    }

    #[test]
    fn test_result_serializes_with_tag() {
        let json = serde_json::to_value(TransmitResult::StoppedByUser).unwrap();
        assert_eq!(json["result"], "stopped_by_user");
    }
}
