//! Delivery through the external transcoder.

use async_trait::async_trait;
use url::Url;

use super::DeliveryStrategy;
use crate::device::transmit_url_with_credentials;
use crate::http::{HttpRequester, RequestOutcome};
use crate::transcode::{
    AudioSource, TranscodeError, TranscodeProcessController, TransmissionHandle, TransmitResult,
};

/// Streams through the transcoder; probes with the Digest requester.
///
/// The transcoder authenticates with the basic credentials embedded in the
/// target URL. The probe goes through [`HttpRequester`], so a successful
/// probe does not prove the device accepts basic credentials on transmit.
#[derive(Debug)]
pub struct ProcessDelivery {
    controller: TranscodeProcessController,
    requester: HttpRequester,
    target: Url,
}

impl ProcessDelivery {
    /// # Errors
    ///
    /// - `TranscodeError::InvalidTarget` - host or transmit path do not form a valid URL
    pub fn new(
        controller: TranscodeProcessController,
        requester: HttpRequester,
    ) -> Result<Self, TranscodeError> {
        let target = transmit_url_with_credentials(
            requester.credentials(),
            &requester.endpoints().transmit_path,
        )
        .map_err(|e| TranscodeError::InvalidTarget {
            reason: format!("{}: {e}", requester.credentials().host),
        })?;

        Ok(Self {
            controller,
            requester,
            target,
        })
    }

    pub fn controller(&self) -> &TranscodeProcessController {
        &self.controller
    }
}

#[async_trait]
impl DeliveryStrategy for ProcessDelivery {
    fn label(&self) -> &'static str {
        "transcoder"
    }

    async fn test_connection(&self) -> RequestOutcome {
        self.requester.test_connection().await
    }

    fn transmit(&self, source: &AudioSource) -> Result<TransmissionHandle, TransmitResult> {
        self.controller
            .start(source, &self.target)
            .map_err(TransmitResult::from)
    }
}
