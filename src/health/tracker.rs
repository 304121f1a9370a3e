//! Probe with failure-threshold hysteresis.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::endpoint::Endpoint;
use crate::health::probe::Probe;
use crate::health::state::ProbeState;

/// Outcome of [`HealthProbe::probe_and_advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Probe passed. Carries the failure count it cleared.
    Healthy { cleared: u32 },
    /// Probe failed, threshold not reached yet.
    Failing { failures: u32 },
    /// Probe failed and the threshold of consecutive failures is reached.
    ThresholdReached { failures: u32 },
    /// State was reset while the probe was in flight; the result was dropped.
    Superseded,
}

impl Advance {
    /// Whether the caller should attempt a transition.
    pub fn needs_transition(&self) -> bool {
        matches!(self, Advance::ThresholdReached { .. })
    }
}

#[derive(Debug)]
struct Tracked {
    state: ProbeState,
    /// Bumped by every reset. A probe result is only recorded against the
    /// epoch it started in.
    epoch: u64,
}

/// Wraps a [`Probe`] with a consecutive-failure counter.
///
/// A single failed probe never asks for a transition; only
/// `failure_threshold` failures in a row do.
#[derive(Debug)]
pub struct HealthProbe<P> {
    prober: P,
    failure_threshold: u32,
    tracked: Mutex<Tracked>,
}

impl<P: Probe> HealthProbe<P> {
    /// A threshold of 0 is treated as 1.
    pub fn new(prober: P, failure_threshold: u32) -> Self {
        Self {
            prober,
            failure_threshold: failure_threshold.max(1),
            tracked: Mutex::new(Tracked {
                state: ProbeState::new(),
                epoch: 0,
            }),
        }
    }

    /// One probe, no bookkeeping.
    pub async fn probe(&self, endpoint: &Endpoint) -> bool {
        self.prober.probe(endpoint).await
    }

    /// Probe and update the failure counter.
    ///
    /// If [`reset`](Self::reset) runs while the probe is in flight, the
    /// result belongs to an endpoint that is no longer tracked and is
    /// discarded.
    pub async fn probe_and_advance(&self, endpoint: &Endpoint) -> Advance {
        let started_in = self.lock().epoch;
        let healthy = self.prober.probe(endpoint).await;

        let mut tracked = self.lock();
        if tracked.epoch != started_in {
            drop(tracked);
            tracing::debug!(
                endpoint = %endpoint,
                healthy,
                "Probe state reset during probe, discarding result"
            );
            return Advance::Superseded;
        }

        if healthy {
            let cleared = tracked.state.record_success();
            drop(tracked);
            if cleared > 0 {
                tracing::info!(
                    endpoint = %endpoint,
                    failures = cleared,
                    "Endpoint recovered"
                );
            }
            return Advance::Healthy { cleared };
        }

        let failures = tracked.state.record_failure();
        drop(tracked);
        tracing::warn!(
            endpoint = %endpoint,
            failures,
            threshold = self.failure_threshold,
            "Endpoint probe failed"
        );
        if failures >= self.failure_threshold {
            Advance::ThresholdReached { failures }
        } else {
            Advance::Failing { failures }
        }
    }

    /// Forget all failure history. Call right after switching endpoints.
    /// Probes already in flight will not be recorded.
    pub fn reset(&self) {
        let mut tracked = self.lock();
        tracked.state = ProbeState::new();
        tracked.epoch = tracked.epoch.wrapping_add(1);
        drop(tracked);
        tracing::debug!("Health probe state reset");
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().state.consecutive_failures()
    }

    pub fn last_success(&self) -> Instant {
        self.lock().state.last_success()
    }

    pub fn time_since_last_success(&self) -> Duration {
        self.lock().state.time_since_last_success()
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// `true` while the failure count is below the threshold.
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures() < self.failure_threshold
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ProbeState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        // Tracked has no invariants a panicking holder could break.
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
