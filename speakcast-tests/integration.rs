//! Integration tests for Speakcast
//!
//! These tests drive the public API against a mock device speaking HTTP
//! Digest and against fake transcoder scripts. Process tests need `/bin/sh`
//! and only run on unix.

#[path = "integration/mock_device.rs"]
mod mock_device;

#[path = "integration/digest_requests.rs"]
mod digest_requests;
#[path = "integration/direct_upload.rs"]
mod direct_upload;
#[path = "integration/session_manager.rs"]
mod session_manager;
#[path = "integration/transcoder_lifecycle.rs"]
mod transcoder_lifecycle;
