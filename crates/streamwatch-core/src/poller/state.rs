//! Debounce and escalation state machine.
//!
//! Pure with respect to time: every call receives `now`, so the machine can be
//! driven in tests without a runtime.

use std::time::Duration;

use tokio::time::Instant;

use crate::provider::{PollError, PollResult};

/// Last state announced to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Nothing announced yet. Never re-entered.
    #[default]
    Unknown,
    Live,
    Offline,
}

/// A state change the poller must report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    WentLive,
    WentOffline,
    /// A failure run has lasted at least the error threshold. Carries the
    /// failure that crossed it.
    SustainedError(PollError),
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Consecutive non-live observations before announcing offline.
    pub disconnect: u32,
    /// Continuous failure duration before escalating.
    pub error: Duration,
}

/// The poller's memory between iterations.
#[derive(Debug, Default)]
pub struct MonitorState {
    current: StreamState,
    consecutive_offline: u32,
    first_error_at: Option<Instant>,
    error_reported: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> StreamState {
        self.current
    }

    pub fn consecutive_offline(&self) -> u32 {
        self.consecutive_offline
    }

    pub fn first_error_at(&self) -> Option<Instant> {
        self.first_error_at
    }

    pub fn error_reported(&self) -> bool {
        self.error_reported
    }

    /// Folds one poll result into the state.
    ///
    /// State is fully updated before this returns, so whatever the caller does
    /// with the transition cannot leave the machine half-applied.
    pub fn observe(
        &mut self,
        result: &PollResult,
        now: Instant,
        thresholds: &Thresholds,
    ) -> Option<Transition> {
        match result {
            Ok(live) => self.record_success(*live, thresholds.disconnect),
            Err(err) => self.record_failure(err, now, thresholds.error),
        }
    }

    fn record_success(&mut self, live: bool, disconnect_threshold: u32) -> Option<Transition> {
        // Any answer from the provider ends the failure run.
        self.first_error_at = None;
        self.error_reported = false;

        if live {
            self.consecutive_offline = 0;
            if self.current == StreamState::Live {
                return None;
            }
            tracing::info!("Stream is live.");
            self.current = StreamState::Live;
            return Some(Transition::WentLive);
        }

        self.consecutive_offline = self.consecutive_offline.saturating_add(1);
        tracing::info!(
            disconnect_count = self.consecutive_offline,
            "Stream not live."
        );
        if self.consecutive_offline >= disconnect_threshold.max(1)
            && self.current != StreamState::Offline
        {
            tracing::info!("Disconnect threshold reached.");
            self.current = StreamState::Offline;
            return Some(Transition::WentOffline);
        }
        None
    }

    fn record_failure(
        &mut self,
        err: &PollError,
        now: Instant,
        error_threshold: Duration,
    ) -> Option<Transition> {
        let Some(first_error_at) = self.first_error_at else {
            self.first_error_at = Some(now);
            return None;
        };

        if self.error_reported || now.saturating_duration_since(first_error_at) < error_threshold {
            return None;
        }

        tracing::warn!(
            failing_for_secs = now.saturating_duration_since(first_error_at).as_secs(),
            "Polling has been failing past the error threshold."
        );
        self.error_reported = true;
        Some(Transition::SustainedError(err.clone()))
    }
}
