//! Direct upload of pre-encoded audio.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use super::DeliveryStrategy;
use crate::http::{HttpRequester, RequestOutcome};
use crate::transcode::{AudioSource, TransmissionHandle, TransmitResult};

/// G.711 mu-law at 8 kHz, one byte per sample.
const MULAW_BYTES_PER_SECOND: f64 = 8000.0;

/// Posts a file's bytes unchanged to the transmit endpoint.
///
/// The file must already be encoded the way the device expects; nothing is
/// transcoded. Authentication goes through the Digest requester.
#[derive(Debug, Clone)]
pub struct DirectUploadDelivery {
    requester: HttpRequester,
}

impl DirectUploadDelivery {
    pub fn new(requester: HttpRequester) -> Self {
        Self { requester }
    }
}

#[async_trait]
impl DeliveryStrategy for DirectUploadDelivery {
    fn label(&self) -> &'static str {
        "direct-upload"
    }

    async fn test_connection(&self) -> RequestOutcome {
        self.requester.test_connection().await
    }

    fn transmit(&self, source: &AudioSource) -> Result<TransmissionHandle, TransmitResult> {
        let path = match source {
            AudioSource::File(path) => path.clone(),
            AudioSource::TestTone { .. } => {
                return Err(TransmitResult::LaunchError {
                    reason: "test tones need the transcoder delivery".to_string(),
                });
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let requester = self.requester.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                result = upload_file(&requester, &path) => result,
                _ = &mut stop_rx => {
                    info!("Upload of {} cancelled", path.display());
                    TransmitResult::StoppedByUser
                }
            };
            outcome_tx.send_replace(Some(result));
        });

        Ok(TransmissionHandle::new(None, stop_tx, outcome_rx, None))
    }
}

async fn upload_file(requester: &HttpRequester, path: &Path) -> TransmitResult {
    let payload = match tokio::fs::read(path).await {
        Ok(payload) => Bytes::from(payload),
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return TransmitResult::LaunchError {
                reason: format!("{}: {e}", path.display()),
            };
        }
    };

    let size = payload.len();
    let started = Instant::now();
    match requester.upload_raw(payload).await {
        RequestOutcome::Success { .. } => upload_summary(path, size, started.elapsed()),
        RequestOutcome::Failure { status, message } => {
            TransmitResult::DeliveryError { status, message }
        }
    }
}

/// Success labels in the same shape the transcoder prints them.
fn upload_summary(path: &Path, size: usize, elapsed: Duration) -> TransmitResult {
    let media = Duration::from_secs_f64(size as f64 / MULAW_BYTES_PER_SECOND);
    let speed = if elapsed.is_zero() {
        "unknown".to_string()
    } else {
        format!("{:.2}x", media.as_secs_f64() / elapsed.as_secs_f64())
    };
    info!("Uploaded {} ({} bytes)", path.display(), size);

    TransmitResult::Success {
        size: format!("{}kB", size.div_ceil(1024)),
        duration: format_timestamp(media),
        speed,
    }
}

fn format_timestamp(duration: Duration) -> String {
    let total = duration.as_secs();
    let centis = duration.subsec_millis() / 10;
    format!(
        "{:02}:{:02}:{:02}.{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        centis
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::device::{Credentials, DeviceEndpoints};

    fn delivery() -> DirectUploadDelivery {
        DirectUploadDelivery::new(
            HttpRequester::new(
                Credentials::new("127.0.0.1:9", "root", "pass"),
                DeviceEndpoints::default(),
                &HttpConfig::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_tone_is_rejected_without_transcoder() {
        let result = delivery().transmit(&AudioSource::beep(Duration::from_secs(1)));
        assert!(matches!(result, Err(TransmitResult::LaunchError { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_file_resolves_to_launch_error() {
        let handle = delivery()
            .transmit(&AudioSource::file("/nonexistent/clip.ulaw"))
            .unwrap();
        assert!(matches!(
            handle.wait().await,
            TransmitResult::LaunchError { .. }
        ));
    }

    #[test]
    fn test_summary_labels() {
        let result = upload_summary(Path::new("clip.ulaw"), 40_000, Duration::from_secs(1));
        assert_eq!(
            result,
            TransmitResult::Success {
                size: "40kB".to_string(),
                duration: "00:00:05.00".to_string(),
                speed: "5.00x".to_string(),
            }
        );
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(Duration::from_millis(3_723_450)), "01:02:03.45");
    }
}
