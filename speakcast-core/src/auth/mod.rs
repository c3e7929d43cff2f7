//! HTTP Digest authentication.
//!
//! Pure computation: parses a server challenge and produces the matching
//! `Authorization` header value. No I/O happens here; the HTTP round-trip
//! lives in [`crate::http`].

pub mod challenge;
pub mod digest;

use thiserror::Error;

pub use challenge::{DigestAlgorithm, DigestChallenge, advertises_digest};
pub use digest::{DigestAuthenticator, DigestCredentialResponse, NonceCount};

/// Errors raised while interpreting an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The challenge is not Digest or lacks a field required for qop=auth.
    #[error("Unsupported authentication challenge: {reason}")]
    UnsupportedChallenge { reason: String },
}

impl AuthError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedChallenge {
            reason: reason.into(),
        }
    }
}
