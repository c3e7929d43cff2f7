//! Session records and lifecycle states.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transcode::{AudioSource, TransmitResult};

/// Lifecycle of one stream.
///
/// `Idle -> Starting -> Running -> {Completed | Stopped | Failed}`; the
/// three terminal states return the manager to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl SessionState {
    /// True while a transmission may still be producing audio.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }

    /// Terminal state matching a final result.
    pub fn from_result(result: &TransmitResult) -> Self {
        match result {
            TransmitResult::Success { .. } => SessionState::Completed,
            TransmitResult::StoppedByUser => SessionState::Stopped,
            _ => SessionState::Failed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One stream attempt as seen by the manager.
#[derive(Debug, Clone)]
pub struct StreamSession {
    /// Strictly increasing per manager; identifies the attempt in logs
    pub generation: u64,
    pub source: AudioSource,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    /// Transcoder process id while running
    pub pid: Option<u32>,
}

impl StreamSession {
    pub fn new(generation: u64, source: AudioSource) -> Self {
        Self {
            generation,
            source,
            started_at: Utc::now(),
            state: SessionState::Starting,
            pid: None,
        }
    }

    /// Time since the attempt started, clamped at zero.
    pub fn elapsed(&self) -> chrono::Duration {
        (Utc::now() - self.started_at).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_from_results() {
        assert_eq!(
            SessionState::from_result(&TransmitResult::success_without_telemetry()),
            SessionState::Completed
        );
        assert_eq!(
            SessionState::from_result(&TransmitResult::StoppedByUser),
            SessionState::Stopped
        );
        assert_eq!(
            SessionState::from_result(&TransmitResult::LaunchError {
                reason: "missing".to_string()
            }),
            SessionState::Failed
        );
    }

    #[test]
    fn test_only_starting_and_running_are_active() {
        assert!(SessionState::Starting.is_active());
        assert!(SessionState::Running.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Stopped.is_active());
    }

    #[test]
    fn test_new_session_starts_in_starting() {
        let session = StreamSession::new(7, AudioSource::file("a.mp3"));
        assert_eq!(session.state, SessionState::Starting);
        assert_eq!(session.state.to_string(), "starting");
        assert!(session.elapsed() >= chrono::Duration::zero());
    }
}
