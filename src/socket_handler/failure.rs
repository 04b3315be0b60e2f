//! Failure bookkeeping that gates reconnect attempts.

use std::{
    io,
    time::{Duration, Instant},
};

/// Remembers the most recent transport failure and when the last two
/// failures happened.
///
/// Each failure shifts the "last" timestamp into the "previous" slot. The
/// reconnect gate measures elapsed time from the *previous* failure, so a
/// burst of failures backs off harder than an isolated one.
#[derive(Debug)]
pub struct FailureTracker {
    cooldown: Duration,
    last_error: Option<io::Error>,
    last_failure: Option<Instant>,
    previous_failure: Option<Instant>,
}

impl FailureTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_error: None,
            last_failure: None,
            previous_failure: None,
        }
    }

    /// Store `error` and shift the timestamp window.
    pub fn record_failure(&mut self, error: io::Error, now: Instant) {
        self.last_error = Some(error);
        self.previous_failure = self.last_failure.replace(now);
    }

    /// True while less than the cooldown has passed since the previous
    /// failure.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.previous_failure
            .is_some_and(|previous| now.saturating_duration_since(previous) < self.cooldown)
    }

    /// Forget the stored error but keep the timestamp window.
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.last_error = None;
        self.last_failure = None;
        self.previous_failure = None;
    }

    pub fn last_error(&self) -> Option<&io::Error> {
        self.last_error.as_ref()
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn previous_failure(&self) -> Option<Instant> {
        self.previous_failure
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
