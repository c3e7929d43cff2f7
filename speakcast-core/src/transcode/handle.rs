//! Handles returned by a started transmission.

use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot, watch};

use super::diagnostics::ProgressSample;
use super::result::TransmitResult;

/// Exclusive owner of one running transmission.
///
/// Dropping the handle closes its stop channel, which the supervisor treats
/// exactly like [`TransmissionHandle::stop`]; nothing outlives its owner.
#[derive(Debug)]
pub struct TransmissionHandle {
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    outcome: watch::Receiver<Option<TransmitResult>>,
    progress: Option<ProgressEvents>,
}

impl TransmissionHandle {
    pub(crate) fn new(
        pid: Option<u32>,
        stop_tx: oneshot::Sender<()>,
        outcome: watch::Receiver<Option<TransmitResult>>,
        progress: Option<ProgressEvents>,
    ) -> Self {
        Self {
            pid,
            stop_tx: Some(stop_tx),
            outcome,
            progress,
        }
    }

    /// OS process id, when the transmission runs in a child process.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Requests termination without waiting for it.
    ///
    /// Returns false when a stop was already requested or the transmission
    /// had already finished.
    pub fn stop(&mut self) -> bool {
        match self.stop_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_tx.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Result, if the transmission has already ended.
    pub fn try_result(&self) -> Option<TransmitResult> {
        self.outcome.borrow().clone()
    }

    /// Takes the progress subscription; available once per transmission.
    pub fn take_progress(&mut self) -> Option<ProgressEvents> {
        self.progress.take()
    }

    /// Detached view of the outcome that does not keep the transmission alive.
    pub fn completion(&self) -> Completion {
        Completion {
            outcome: self.outcome.clone(),
        }
    }

    /// Waits for the transmission to end.
    pub async fn wait(&self) -> TransmitResult {
        self.completion().wait().await
    }
}

/// Future-like view of a transmission's final result.
///
/// Can be cloned and awaited from any task; every clone observes the same
/// result.
#[derive(Debug, Clone)]
pub struct Completion {
    outcome: watch::Receiver<Option<TransmitResult>>,
}

impl Completion {
    /// A completion that is already resolved.
    pub fn ready(result: TransmitResult) -> Self {
        let (_tx, outcome) = watch::channel(Some(result));
        Self { outcome }
    }

    pub(crate) fn from_receiver(outcome: watch::Receiver<Option<TransmitResult>>) -> Self {
        Self { outcome }
    }

    pub fn try_result(&self) -> Option<TransmitResult> {
        self.outcome.borrow().clone()
    }

    pub async fn wait(mut self) -> TransmitResult {
        let result = match self.outcome.wait_for(Option::is_some).await {
            Ok(current) => (*current).clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| TransmitResult::ProcessError {
            exit_code: None,
            diagnostic_text: "transmission ended without reporting a result".to_string(),
        })
    }
}

impl IntoFuture for Completion {
    type Output = TransmitResult;
    type IntoFuture = BoxFuture<'static, TransmitResult>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

/// Progress samples of one transmission, in arrival order.
///
/// Backed by a bounded channel; samples produced while the buffer is full
/// are dropped rather than delaying the diagnostic reader.
#[derive(Debug)]
pub struct ProgressEvents {
    receiver: mpsc::Receiver<ProgressSample>,
}

impl ProgressEvents {
    pub(crate) fn new(receiver: mpsc::Receiver<ProgressSample>) -> Self {
        Self { receiver }
    }

    /// Next sample, or `None` once the diagnostic stream has ended.
    pub async fn next_sample(&mut self) -> Option<ProgressSample> {
        self.receiver.recv().await
    }
}

impl Stream for ProgressEvents {
    type Item = ProgressSample;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    fn handle() -> (
        TransmissionHandle,
        oneshot::Receiver<()>,
        watch::Sender<Option<TransmitResult>>,
        mpsc::Sender<ProgressSample>,
    ) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (progress_tx, progress_rx) = mpsc::channel(4);
        let handle = TransmissionHandle::new(
            Some(42),
            stop_tx,
            outcome_rx,
            Some(ProgressEvents::new(progress_rx)),
        );
        (handle, stop_rx, outcome_tx, progress_tx)
    }

    #[tokio::test]
    async fn test_stop_is_delivered_once() {
        let (mut handle, stop_rx, _outcome_tx, _progress_tx) = handle();

        assert!(handle.stop());
        assert!(handle.stop_requested());
        assert!(!handle.stop());
        assert!(stop_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_stop_channel() {
        let (handle, stop_rx, _outcome_tx, _progress_tx) = handle();
        drop(handle);
        assert!(stop_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_completion_outlives_handle() {
        let (handle, _stop_rx, outcome_tx, _progress_tx) = handle();
        let completion = handle.completion();
        drop(handle);

        assert_eq!(completion.try_result(), None);
        outcome_tx.send_replace(Some(TransmitResult::StoppedByUser));
        assert_eq!(completion.await, TransmitResult::StoppedByUser);
    }

    #[tokio::test]
    async fn test_wait_reports_lost_supervisor() {
        let (handle, _stop_rx, outcome_tx, _progress_tx) = handle();
        drop(outcome_tx);

        let result = handle.wait().await;
        assert!(matches!(
            result,
            TransmitResult::ProcessError {
                exit_code: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ready_completion() {
        let completion = Completion::ready(TransmitResult::success_without_telemetry());
        assert!(completion.clone().await.is_success());
        assert!(completion.try_result().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_progress_stream_ends_with_sender() {
        let (mut handle, _stop_rx, _outcome_tx, progress_tx) = handle();
        let mut progress = handle.take_progress().unwrap();
        assert!(handle.take_progress().is_none());

        progress_tx
            .send(ProgressSample {
                elapsed: Duration::from_secs(1),
                size_label: None,
                size_bytes: None,
                speed_factor: None,
            })
            .await
            .unwrap();
        drop(progress_tx);

        let samples: Vec<_> = progress.by_ref().collect().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].elapsed, Duration::from_secs(1));
        assert!(progress.next_sample().await.is_none());
    }
}
