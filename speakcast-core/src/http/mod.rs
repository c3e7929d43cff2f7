//! Direct HTTP delivery to the device.
//!
//! The requester answers a Digest challenge exactly once and never retries
//! otherwise: the device is LAN-local, and repeating a transmit request
//! would repeat its audible side effect.

pub mod requester;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

pub use requester::HttpRequester;

/// Errors that can occur during a device request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Connection refused, DNS failure, timeout or a broken body read
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The Digest challenge could not be answered
    #[error(transparent)]
    AuthChallenge(#[from] AuthError),

    /// A 401 arrived without any Digest challenge
    #[error("Server does not support Digest authentication")]
    DigestNotOffered,

    /// Non-2xx status after at most one authenticated retry
    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },
}

impl RequestError {
    /// HTTP status associated with the failure, if the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Transport(e) => e.status().map(|s| s.as_u16()),
            RequestError::AuthChallenge(_) | RequestError::DigestNotOffered => Some(401),
            RequestError::HttpStatus { status, .. } => Some(*status),
        }
    }
}

/// Final classification of one `request()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Status in `[200, 300)`
    Success { status: u16, body: String },
    /// Any other status, or no status at all for transport failures
    Failure {
        status: Option<u16>,
        message: String,
    },
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestOutcome::Success { status, .. } => Some(*status),
            RequestOutcome::Failure { status, .. } => *status,
        }
    }
}

impl From<RequestError> for RequestOutcome {
    fn from(error: RequestError) -> Self {
        RequestOutcome::Failure {
            status: error.status(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_conversion() {
        let outcome: RequestOutcome = RequestError::HttpStatus {
            status: 403,
            reason: "Forbidden".to_string(),
        }
        .into();

        assert_eq!(
            outcome,
            RequestOutcome::Failure {
                status: Some(403),
                message: "HTTP 403: Forbidden".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_digest_maps_to_401() {
        let outcome: RequestOutcome = RequestError::DigestNotOffered.into();
        assert_eq!(outcome.status(), Some(401));
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = RequestOutcome::Success {
            status: 200,
            body: "ok".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["status"], 200);
    }
}
