//! Single-session stream supervision.

use std::future::IntoFuture;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};

use super::state::{SessionState, StreamSession};
use crate::config::SpeakcastConfig;
use crate::delivery::{DeliveryStrategy, strategy_from_config};
use crate::http::{HttpRequester, RequestOutcome};
use crate::transcode::{
    AudioSource, Completion, ProgressEvents, TransmissionHandle, TransmitResult,
};

/// Reply to a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub success: bool,
    pub message: String,
}

/// Result of one `start()`, resolved when that stream ends.
///
/// Independent of the manager: it keeps resolving even after the stream is
/// replaced or the manager is dropped.
#[derive(Debug)]
pub struct PendingTransmit {
    generation: u64,
    completion: Completion,
    progress: Option<ProgressEvents>,
}

impl PendingTransmit {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Progress samples for this stream; `None` if already taken or the
    /// delivery path reports no progress.
    pub fn take_progress(&mut self) -> Option<ProgressEvents> {
        self.progress.take()
    }

    pub fn try_result(&self) -> Option<TransmitResult> {
        self.completion.try_result()
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub async fn wait(self) -> TransmitResult {
        self.completion.wait().await
    }
}

impl IntoFuture for PendingTransmit {
    type Output = TransmitResult;
    type IntoFuture = BoxFuture<'static, TransmitResult>;

    fn into_future(self) -> Self::IntoFuture {
        self.completion.into_future()
    }
}

#[derive(Debug)]
struct ActiveStream {
    session: StreamSession,
    handle: TransmissionHandle,
}

/// Owns at most one running stream and routes device requests.
///
/// All mutation goes through `&mut self`, so the single-active-stream rule
/// holds without locks: a `stop()` always reaches the stream started by the
/// most recent `start()`, never an older one.
#[derive(Debug)]
pub struct StreamSessionManager {
    requester: HttpRequester,
    strategy: Arc<dyn DeliveryStrategy>,
    active: Option<ActiveStream>,
    last_session: Option<StreamSession>,
    last_result: Option<TransmitResult>,
    next_generation: u64,
}

impl StreamSessionManager {
    pub fn new(requester: HttpRequester, strategy: Arc<dyn DeliveryStrategy>) -> Self {
        Self {
            requester,
            strategy,
            active: None,
            last_session: None,
            last_result: None,
            next_generation: 1,
        }
    }

    /// Builds requester and delivery strategy from configuration.
    ///
    /// # Errors
    ///
    /// - `SpeakcastError::Configuration` - the configuration failed validation
    /// - `SpeakcastError::Request` - the HTTP client could not be built
    /// - `SpeakcastError::Transcode` - the device address does not form a transmit URL
    pub fn from_config(config: &SpeakcastConfig) -> crate::Result<Self> {
        config.validate()?;
        let requester = HttpRequester::new(
            config.device.credentials.clone(),
            config.device.endpoints.clone(),
            &config.http,
        )?;
        let strategy = strategy_from_config(config, requester.clone())?;
        info!(
            "Session manager ready for {} using {} delivery",
            config.device.credentials.host,
            strategy.label()
        );
        Ok(Self::new(requester, strategy))
    }

    pub fn delivery_label(&self) -> &'static str {
        self.strategy.label()
    }

    /// Starts streaming `source`, replacing any running stream.
    ///
    /// A running stream is sent a stop request first and forgotten; its own
    /// `PendingTransmit` still resolves, normally to `StoppedByUser`.
    pub fn start(&mut self, source: AudioSource) -> PendingTransmit {
        self.reap();
        if let Some(previous) = self.active.take() {
            info!(
                "Replacing stream generation {} ({})",
                previous.session.generation, previous.session.source
            );
            self.retire(previous);
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let mut session = StreamSession::new(generation, source);
        debug!("Generation {} {}", generation, session.state);

        match self.strategy.transmit(&session.source) {
            Ok(mut handle) => {
                session.state = SessionState::Running;
                session.pid = handle.pid();
                info!(
                    "Streaming {} as generation {} via {}",
                    session.source,
                    generation,
                    self.strategy.label()
                );

                let pending = PendingTransmit {
                    generation,
                    completion: handle.completion(),
                    progress: handle.take_progress(),
                };
                self.active = Some(ActiveStream { session, handle });
                pending
            }
            Err(result) => {
                session.state = SessionState::Failed;
                info!(
                    "Generation {} failed to start: {}",
                    generation,
                    result.describe()
                );
                self.record(session, result.clone());
                PendingTransmit {
                    generation,
                    completion: Completion::ready(result),
                    progress: None,
                }
            }
        }
    }

    /// Requests termination of the running stream without waiting for it.
    pub fn stop(&mut self) -> StopOutcome {
        self.reap();
        match self.active.take() {
            Some(active) => {
                info!("Stopping stream generation {}", active.session.generation);
                self.retire(active);
                StopOutcome {
                    success: true,
                    message: "Stream stopped".to_string(),
                }
            }
            None => StopOutcome {
                success: false,
                message: "No active stream".to_string(),
            },
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Live state: `Running` while a stream is active, otherwise `Idle`.
    ///
    /// How the most recent stream ended (`Completed`, `Stopped` or `Failed`)
    /// is reported by [`last_session`](Self::last_session).
    pub fn state(&self) -> SessionState {
        if self.is_streaming() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    /// The running stream, if any.
    pub fn current_session(&self) -> Option<&StreamSession> {
        self.active
            .as_ref()
            .filter(|active| !active.handle.is_finished())
            .map(|active| &active.session)
    }

    /// Most recently ended stream, with its terminal state.
    ///
    /// A stream that exited on its own is reported as soon as its result is
    /// published, before it is reaped.
    pub fn last_session(&self) -> Option<StreamSession> {
        match self.finished_active() {
            Some((session, _)) => Some(session),
            None => self.last_session.clone(),
        }
    }

    pub fn last_result(&self) -> Option<TransmitResult> {
        match self.finished_active() {
            Some((_, result)) => Some(result),
            None => self.last_result.clone(),
        }
    }

    /// Moves a stream that has exited on its own into the history.
    ///
    /// Returns the result when a stream was reaped by this call.
    pub fn reap(&mut self) -> Option<TransmitResult> {
        let finished = self
            .active
            .as_ref()
            .and_then(|active| active.handle.try_result())?;
        let active = self.active.take()?;
        self.record(active.session, finished.clone());
        Some(finished)
    }

    /// Probes the device; independent of any running stream.
    pub async fn test_connection(&self) -> RequestOutcome {
        self.strategy.test_connection().await
    }

    /// Posts an already-encoded payload; not subject to the single-stream rule.
    pub async fn upload_raw(&self, payload: Bytes) -> RequestOutcome {
        self.requester.upload_raw(payload).await
    }

    fn retire(&mut self, mut active: ActiveStream) {
        active.handle.stop();
        active.session.state = SessionState::Stopped;
        active.session.pid = None;
        self.last_session = Some(active.session);
        self.last_result = Some(TransmitResult::StoppedByUser);
    }

    /// Active stream whose result is already published, as it will be recorded.
    fn finished_active(&self) -> Option<(StreamSession, TransmitResult)> {
        let active = self.active.as_ref()?;
        let result = active.handle.try_result()?;
        Some((ended(active.session.clone(), &result), result))
    }

    fn record(&mut self, session: StreamSession, result: TransmitResult) {
        let session = ended(session, &result);
        debug!("Generation {} ended {}", session.generation, session.state);
        self.last_session = Some(session);
        self.last_result = Some(result);
    }
}

fn ended(mut session: StreamSession, result: &TransmitResult) -> StreamSession {
    session.state = SessionState::from_result(result);
    session.pid = None;
    session
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, watch};

    use super::*;
    use crate::config::HttpConfig;
    use crate::device::{Credentials, DeviceEndpoints};

    /// Strategy whose transmissions end only when stopped.
    #[derive(Debug, Default)]
    struct ManualDelivery {
        started: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryStrategy for ManualDelivery {
        fn label(&self) -> &'static str {
            "manual"
        }

        async fn test_connection(&self) -> RequestOutcome {
            RequestOutcome::Success {
                status: 200,
                body: "ok".to_string(),
            }
        }

        fn transmit(&self, source: &AudioSource) -> Result<TransmissionHandle, TransmitResult> {
            if matches!(source, AudioSource::TestTone { .. }) {
                return Err(TransmitResult::LaunchError {
                    reason: "no tones".to_string(),
                });
            }
            self.started.fetch_add(1, Ordering::SeqCst);

            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let (outcome_tx, outcome_rx) = watch::channel(None);
            tokio::spawn(async move {
                let _ = stop_rx.await;
                outcome_tx.send_replace(Some(TransmitResult::StoppedByUser));
            });
            Ok(TransmissionHandle::new(None, stop_tx, outcome_rx, None))
        }
    }

    fn manager() -> (StreamSessionManager, Arc<ManualDelivery>) {
        let requester = HttpRequester::new(
            Credentials::new("127.0.0.1:9", "root", "pass"),
            DeviceEndpoints::default(),
            &HttpConfig::default(),
        )
        .unwrap();
        let strategy = Arc::new(ManualDelivery::default());
        (
            StreamSessionManager::new(requester, strategy.clone()),
            strategy,
        )
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_not_an_error() {
        let (mut manager, _) = manager();
        assert_eq!(
            manager.stop(),
            StopOutcome {
                success: false,
                message: "No active stream".to_string(),
            }
        );
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_second_start_replaces_first() {
        let (mut manager, strategy) = manager();

        let first = manager.start(AudioSource::file("one.mp3"));
        let second = manager.start(AudioSource::file("two.mp3"));

        assert_eq!(strategy.started.load(Ordering::SeqCst), 2);
        assert!(second.generation() > first.generation());
        assert!(manager.is_streaming());
        assert_eq!(
            manager.current_session().map(|s| s.generation),
            Some(second.generation())
        );

        let first_result = tokio::time::timeout(Duration::from_secs(5), first)
            .await
            .unwrap();
        assert_eq!(first_result, TransmitResult::StoppedByUser);
        assert_eq!(second.try_result(), None);
    }

    #[tokio::test]
    async fn test_stop_reaches_latest_generation() {
        let (mut manager, _) = manager();
        let pending = manager.start(AudioSource::file("one.mp3"));

        let outcome = manager.stop();
        assert!(outcome.success);
        assert!(!manager.is_streaming());
        assert_eq!(
            manager.last_session().map(|s| s.state),
            Some(SessionState::Stopped)
        );
        assert_eq!(pending.await, TransmitResult::StoppedByUser);
        assert!(!manager.stop().success);
    }

    #[tokio::test]
    async fn test_failed_start_resolves_immediately() {
        let (mut manager, _) = manager();
        let pending = manager.start(AudioSource::beep(Duration::from_secs(1)));

        assert!(matches!(
            pending.try_result(),
            Some(TransmitResult::LaunchError { .. })
        ));
        assert!(!manager.is_streaming());
        assert_eq!(
            manager.last_session().map(|s| s.state),
            Some(SessionState::Failed)
        );
    }

    /// Strategy whose transmissions have already succeeded when returned.
    #[derive(Debug)]
    struct FinishedDelivery;

    #[async_trait]
    impl DeliveryStrategy for FinishedDelivery {
        fn label(&self) -> &'static str {
            "finished"
        }

        async fn test_connection(&self) -> RequestOutcome {
            RequestOutcome::Success {
                status: 200,
                body: "ok".to_string(),
            }
        }

        fn transmit(&self, _source: &AudioSource) -> Result<TransmissionHandle, TransmitResult> {
            let (stop_tx, _stop_rx) = oneshot::channel::<()>();
            let (_outcome_tx, outcome_rx) =
                watch::channel(Some(TransmitResult::success_without_telemetry()));
            Ok(TransmissionHandle::new(None, stop_tx, outcome_rx, None))
        }
    }

    #[tokio::test]
    async fn test_natural_exit_is_visible_without_reap() {
        let (manager, _) = manager();
        let mut manager = StreamSessionManager::new(manager.requester, Arc::new(FinishedDelivery));

        let first = manager.start(AudioSource::file("one.mp3"));
        let result = first.await;

        assert!(!manager.is_streaming());
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.last_result(), Some(result.clone()));
        assert_eq!(
            manager.last_session().map(|s| (s.generation, s.state, s.pid)),
            Some((1, SessionState::Completed, None))
        );

        // Reaping records the same history the accessors already reported.
        assert_eq!(manager.reap(), Some(result.clone()));
        assert_eq!(manager.last_result(), Some(result));
        assert_eq!(
            manager.last_session().map(|s| s.state),
            Some(SessionState::Completed)
        );
        assert_eq!(manager.reap(), None);
    }

    #[tokio::test]
    async fn test_connection_probe_ignores_stream_state() {
        let (mut manager, _) = manager();
        let _pending = manager.start(AudioSource::file("one.mp3"));

        assert!(manager.test_connection().await.is_success());
        assert!(manager.is_streaming());
    }
}
