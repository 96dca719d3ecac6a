//! Fetch pacing and backoff.

use crate::config::LoopConfig;
use crate::fetcher::FetchOutcome;
use std::time::Duration;
use tokio::time::Instant;

/// Timers deciding when the next fetch may run.
///
/// A fetch is due once the current backoff has elapsed and at least
/// `fetch_delay` has passed since the last successful fetch. Both conditions
/// start satisfied, so the first tick fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopTimers {
    last_fetch_attempt_at: Option<Instant>,
    cycle_sleep: Duration,
    sleep_started_at: Option<Instant>,
}

impl LoopTimers {
    /// Creates timers that allow an immediate fetch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the loop is still inside a backoff window.
    #[must_use]
    pub fn is_sleeping(&self, now: Instant) -> bool {
        self.sleep_started_at
            .is_some_and(|started| now.saturating_duration_since(started) < self.cycle_sleep)
    }

    /// Returns whether a fetch should run at `now`.
    #[must_use]
    pub fn fetch_due(&self, now: Instant, fetch_delay: Duration) -> bool {
        if self.is_sleeping(now) {
            return false;
        }
        self.last_fetch_attempt_at
            .map_or(true, |last| now.saturating_duration_since(last) >= fetch_delay)
    }

    /// Applies the backoff rule for `outcome` observed at `now`.
    ///
    /// [`FetchOutcome::UnknownFailure`] leaves every timer untouched, so the
    /// next tick retries.
    pub fn record(&mut self, outcome: &FetchOutcome, now: Instant, settings: &LoopConfig) {
        match outcome {
            FetchOutcome::Success(_) => {
                self.last_fetch_attempt_at = Some(now);
                self.cycle_sleep = Duration::ZERO;
            }
            FetchOutcome::NoInternet => {
                self.cycle_sleep = settings.no_internet_delay;
                self.sleep_started_at = Some(now);
            }
            FetchOutcome::NoMatchingMessage => {
                self.cycle_sleep = settings.fetch_delay;
                self.sleep_started_at = Some(now);
            }
            FetchOutcome::UnknownFailure(_) => {}
        }
    }

    /// Time of the last successful fetch.
    #[must_use]
    pub fn last_fetch_attempt_at(&self) -> Option<Instant> {
        self.last_fetch_attempt_at
    }

    /// Current backoff length.
    #[must_use]
    pub fn cycle_sleep(&self) -> Duration {
        self.cycle_sleep
    }

    /// Start of the current backoff window.
    #[must_use]
    pub fn sleep_started_at(&self) -> Option<Instant> {
        self.sleep_started_at
    }
}
