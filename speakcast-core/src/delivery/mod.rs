//! Pluggable delivery strategies.
//!
//! The session manager does not care how audio reaches the device. It only
//! needs a connectivity probe and a way to start one transmission that can
//! be stopped and awaited. Two strategies exist: the external transcoder,
//! which posts to the device on its own with credentials embedded in the
//! target URL, and a direct Digest-authenticated upload of pre-encoded audio.

pub mod direct;
pub mod process;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

pub use direct::DirectUploadDelivery;
pub use process::ProcessDelivery;

use crate::config::{DeliveryMode, SpeakcastConfig};
use crate::http::{HttpRequester, RequestOutcome};
use crate::transcode::{
    AudioSource, TranscodeError, TranscodeProcessController, TransmissionHandle, TransmitResult,
};

/// Capability shared by every delivery path.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync + Debug {
    /// Short name for logs and status output.
    fn label(&self) -> &'static str;

    /// Checks that the device is reachable and accepts our credentials.
    async fn test_connection(&self) -> RequestOutcome;

    /// Starts one transmission of `source`.
    ///
    /// Returns immediately; the transmission runs in the background until
    /// it ends or the returned handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns the final result directly when nothing could be started,
    /// typically `TransmitResult::LaunchError`.
    fn transmit(&self, source: &AudioSource) -> Result<TransmissionHandle, TransmitResult>;
}

/// Builds the strategy selected by `config.delivery`.
///
/// # Errors
///
/// - `TranscodeError::InvalidTarget` - the device address does not form a valid transmit URL
pub fn strategy_from_config(
    config: &SpeakcastConfig,
    requester: HttpRequester,
) -> Result<Arc<dyn DeliveryStrategy>, TranscodeError> {
    match config.delivery {
        DeliveryMode::Transcoder => {
            let controller = TranscodeProcessController::new(config.transcoder.clone());
            Ok(Arc::new(ProcessDelivery::new(controller, requester)?))
        }
        DeliveryMode::DirectUpload => Ok(Arc::new(DirectUploadDelivery::new(requester))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Credentials;

    fn requester(config: &SpeakcastConfig) -> HttpRequester {
        HttpRequester::new(
            config.device.credentials.clone(),
            config.device.endpoints.clone(),
            &config.http,
        )
        .unwrap()
    }

    #[test]
    fn test_strategy_follows_delivery_mode() {
        let mut config = SpeakcastConfig::for_testing()
            .with_credentials(Credentials::new("10.0.0.5", "root", "pass"));
        let strategy = strategy_from_config(&config, requester(&config)).unwrap();
        assert_eq!(strategy.label(), "transcoder");

        config.delivery = DeliveryMode::DirectUpload;
        let strategy = strategy_from_config(&config, requester(&config)).unwrap();
        assert_eq!(strategy.label(), "direct-upload");
    }
}
