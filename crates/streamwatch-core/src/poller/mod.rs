//! Stream status poller.
//!
//! One task owns a [`MonitorState`] and loops: poll, fold the result into the
//! state, run the matching [`TransitionHandler`] callback, sleep. Callbacks
//! are awaited in line, so no two of them ever overlap and each finishes
//! before the next poll starts. Shutdown may cut a callback short.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::provider::{PollError, PollResult, StatusProvider};

mod state;

pub use state::{MonitorState, StreamState, Thresholds, Transition};

/// Receives the poller's state transitions.
///
/// Implementations handle their own failures; the poller only guards
/// against panics.
#[async_trait]
pub trait TransitionHandler: Send + Sync {
    async fn on_live(&self);
    async fn on_offline(&self);
    async fn on_error(&self, cause: &PollError);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    pub disconnect_threshold: u32,
    pub error_threshold: Duration,
    pub poll_timeout: Duration,
}

impl PollerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            disconnect_threshold: config.disconnect_threshold.max(1),
            error_threshold: Duration::from_secs(config.error_threshold_secs),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs.max(1)),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            disconnect: self.disconnect_threshold,
            error: self.error_threshold,
        }
    }
}

/// Runs one poll, bounded by `timeout`.
pub async fn poll_with_timeout(provider: &dyn StatusProvider, timeout: Duration) -> PollResult {
    match tokio::time::timeout(timeout, provider.fetch_liveness()).await {
        Ok(result) => result,
        Err(_) => Err(PollError::timeout(timeout)),
    }
}

pub struct StatusPoller {
    provider: Arc<dyn StatusProvider>,
    handler: Arc<dyn TransitionHandler>,
    settings: PollerSettings,
    state: MonitorState,
}

impl StatusPoller {
    pub fn new(
        provider: Arc<dyn StatusProvider>,
        handler: Arc<dyn TransitionHandler>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            provider,
            handler,
            settings,
            state: MonitorState::new(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Polls until `cancel` fires, then returns the final state.
    ///
    /// Cancellation is observed while a poll is in flight, while a callback
    /// runs, and while sleeping. A poll interrupted by cancellation is dropped
    /// without touching the state. An interrupted callback is dropped after
    /// the state has already been updated.
    pub async fn run(mut self, cancel: CancellationToken) -> MonitorState {
        tracing::info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            disconnect_threshold = self.settings.disconnect_threshold,
            error_threshold_secs = self.settings.error_threshold.as_secs(),
            "Status poller started."
        );

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = poll_with_timeout(
                    self.provider.as_ref(),
                    self.settings.poll_timeout,
                ) => result,
            };

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Shutdown requested while applying a poll result.");
                    break;
                }
                _ = self.apply(&result) => {}
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        tracing::info!("Status poller stopped.");
        self.state
    }

    /// Folds one poll result into the state and runs the resulting callback.
    pub async fn apply(&mut self, result: &PollResult) -> Option<Transition> {
        if let Err(err) = result {
            tracing::error!(kind = %err.kind, "Error during polling: {err}");
            if let Some(details) = err.details.as_deref() {
                tracing::debug!(details, "Poll failure details");
            }
        }

        let transition =
            self.state
                .observe(result, Instant::now(), &self.settings.thresholds())?;
        self.dispatch(&transition).await;
        Some(transition)
    }

    async fn dispatch(&self, transition: &Transition) {
        let handler = self.handler.as_ref();
        let outcome = match transition {
            Transition::WentLive => AssertUnwindSafe(handler.on_live()).catch_unwind().await,
            Transition::WentOffline => AssertUnwindSafe(handler.on_offline()).catch_unwind().await,
            Transition::SustainedError(cause) => {
                AssertUnwindSafe(handler.on_error(cause)).catch_unwind().await
            }
        };

        if outcome.is_err() {
            tracing::error!(?transition, "Transition callback panicked; continuing to poll.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::provider::PollErrorKind;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Live,
        Offline,
        Error(PollErrorKind),
    }

    /// Replays scripted results, then cancels the poller and hangs.
    struct ScriptedProvider {
        script: Mutex<VecDeque<PollResult>>,
        cancel: CancellationToken,
    }

    impl ScriptedProvider {
        fn new(script: Vec<PollResult>, cancel: &CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                cancel: cancel.clone(),
            })
        }
    }

    #[async_trait]
    impl StatusProvider for ScriptedProvider {
        async fn fetch_liveness(&self) -> PollResult {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    self.cancel.cancel();
                    std::future::pending().await
                }
            }
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl StatusProvider for SlowProvider {
        async fn fetch_liveness(&self) -> PollResult {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<(Event, Instant)>>,
        panic_on_live: bool,
        stall_on_live: bool,
    }

    impl RecordingHandler {
        fn push(&self, event: Event) {
            self.events.lock().unwrap().push((event, Instant::now()));
        }

        fn events(&self) -> Vec<Event> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(event, _)| event.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TransitionHandler for RecordingHandler {
        async fn on_live(&self) {
            self.push(Event::Live);
            assert!(!self.panic_on_live, "presence update exploded");
            if self.stall_on_live {
                std::future::pending::<()>().await;
            }
        }

        async fn on_offline(&self) {
            self.push(Event::Offline);
        }

        async fn on_error(&self, cause: &PollError) {
            self.push(Event::Error(cause.kind));
        }
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_secs(5),
            disconnect_threshold: 3,
            error_threshold: Duration::from_secs(30 * 60),
            poll_timeout: Duration::from_secs(10),
        }
    }

    async fn run_script(
        script: Vec<PollResult>,
        handler: Arc<RecordingHandler>,
        settings: PollerSettings,
    ) -> MonitorState {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(script, &cancel);
        StatusPoller::new(provider, handler, settings)
            .run(cancel)
            .await
    }

    #[test]
    fn test_settings_from_config_clamp_zeroes() {
        let config = Config {
            poll_interval_secs: 0,
            disconnect_threshold: 0,
            error_threshold_secs: 0,
            poll_timeout_secs: 0,
            ..Config::default()
        };

        let settings = PollerSettings::from_config(&config);

        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.disconnect_threshold, 1);
        assert_eq!(settings.error_threshold, Duration::ZERO);
        assert_eq!(settings.poll_timeout, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_reported_once_after_threshold() {
        let handler = Arc::new(RecordingHandler::default());
        let script = vec![Ok(true), Ok(false), Ok(false), Ok(false), Ok(false)];

        let state = run_script(script, Arc::clone(&handler), settings()).await;

        assert_eq!(handler.events(), vec![Event::Live, Event::Offline]);
        assert_eq!(state.current(), StreamState::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_then_live_fires_live() {
        let handler = Arc::new(RecordingHandler::default());
        let script = vec![Err(PollError::parse("Invalid status payload")), Ok(true)];

        let state = run_script(script, Arc::clone(&handler), settings()).await;

        assert_eq!(handler.events(), vec![Event::Live]);
        assert!(state.first_error_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_failures_escalate_once_near_threshold() {
        let handler = Arc::new(RecordingHandler::default());
        let started = Instant::now();
        // 31 minutes of 503s at a 5 second cadence, then recovery.
        let mut script: Vec<PollResult> = (0..373)
            .map(|_| Err(PollError::http_status(503, "")))
            .collect();
        script.push(Ok(true));

        let state = run_script(script, Arc::clone(&handler), settings()).await;

        let events = handler.events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, Event::Error(PollErrorKind::HttpStatus));
        assert_eq!(events[0].1 - started, Duration::from_secs(30 * 60));
        assert_eq!(events[1].0, Event::Live);
        assert_eq!(state.current(), StreamState::Live);
        assert!(!state.error_reported());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_does_not_stop_loop() {
        let handler = Arc::new(RecordingHandler {
            panic_on_live: true,
            ..RecordingHandler::default()
        });
        let script = vec![Ok(true), Ok(false), Ok(false), Ok(false)];

        let state = run_script(script, Arc::clone(&handler), settings()).await;

        assert_eq!(handler.events(), vec![Event::Live, Event::Offline]);
        assert_eq!(state.current(), StreamState::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_times_out_as_failure() {
        let handler = Arc::new(RecordingHandler::default());
        let settings = PollerSettings {
            error_threshold: Duration::from_secs(15),
            ..settings()
        };
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(Arc::new(SlowProvider), Arc::<RecordingHandler>::clone(&handler), settings);

        let task = tokio::spawn(poller.run(cancel.clone()));
        // Polls time out at t=10s and t=25s, 15s apart.
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        let state = task.await.unwrap();

        assert_eq!(handler.events(), vec![Event::Error(PollErrorKind::Timeout)]);
        assert!(state.error_reported());
        assert_eq!(state.current(), StreamState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_poll_leaves_state_untouched() {
        let handler = Arc::new(RecordingHandler::default());
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(Arc::new(SlowProvider), Arc::<RecordingHandler>::clone(&handler), settings());

        let task = tokio::spawn(poller.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
        let state = task.await.unwrap();

        assert!(handler.events().is_empty());
        assert!(state.first_error_at().is_none());
        assert_eq!(state.current(), StreamState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_stalled_callback_stops_loop() {
        let handler = Arc::new(RecordingHandler {
            stall_on_live: true,
            ..RecordingHandler::default()
        });
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(vec![Ok(true)], &cancel);
        let poller = StatusPoller::new(provider, Arc::<RecordingHandler>::clone(&handler), settings());

        let task = tokio::spawn(poller.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
        let state = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("poller should stop while a callback is stalled")
            .unwrap();

        assert_eq!(handler.events(), vec![Event::Live]);
        assert_eq!(state.current(), StreamState::Live);
    }

    #[tokio::test]
    async fn test_apply_reports_transition() {
        let handler = Arc::new(RecordingHandler::default());
        let cancel = CancellationToken::new();
        let mut poller = StatusPoller::new(
            ScriptedProvider::new(Vec::new(), &cancel),
            Arc::<RecordingHandler>::clone(&handler),
            settings(),
        );

        assert_eq!(poller.apply(&Ok(true)).await, Some(Transition::WentLive));
        assert_eq!(poller.apply(&Ok(true)).await, None);
        assert_eq!(poller.state().current(), StreamState::Live);
        assert_eq!(handler.events(), vec![Event::Live]);
    }
}
