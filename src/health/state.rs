//! Probe failure bookkeeping.
//!
//! # State Transitions
//! ```text
//! success: consecutive_failures → 0, last_success → now
//! failure: consecutive_failures → consecutive_failures + 1
//! reset:   consecutive_failures → 0, last_success → now
//! ```
//!
//! The counter only ever grows between successes.

use std::time::{Duration, Instant};

/// Consecutive-failure counter and last-success timestamp for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ProbeState {
    consecutive_failures: u32,
    last_success: Instant,
}

impl ProbeState {
    pub fn new() -> Self {
        Self {
            consecutive_failures: 0,
            last_success: Instant::now(),
        }
    }

    /// Record a successful probe. Returns the failure count it replaced.
    pub fn record_success(&mut self) -> u32 {
        let previous = self.consecutive_failures;
        self.consecutive_failures = 0;
        self.last_success = Instant::now();
        previous
    }

    /// Record a failed probe. Returns the new failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Instant {
        self.last_success
    }

    pub fn time_since_last_success(&self) -> Duration {
        self.last_success.elapsed()
    }
}

impl Default for ProbeState {
    fn default() -> Self {
        Self::new()
    }
}
