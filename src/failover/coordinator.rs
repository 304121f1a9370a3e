//! Failover coordinator.
//!
//! # Responsibilities
//! - Probe the active endpoint on the health-check cadence
//! - Switch to the next reachable endpoint once the failure threshold is hit
//! - Probe the primary on the recovery-check cadence while failed over
//! - Fail back on request (or automatically, per [`FailbackPolicy`])
//! - Dispatch exactly one event per transition
//!
//! # Concurrency
//! `active_index` and the outage flag are atomics, so accessors never wait.
//! Transitions serialize on `transition`; probing during a scan happens while
//! holding it, but accessors never touch it. The commit step of every
//! transition has no await point, so a cancelled task can abandon a
//! transition before it commits and never in the middle of it.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{CoordinatorConfig, FailoverConfig};
use crate::endpoint::Endpoint;
use crate::failover::event::{FailoverEvent, FailoverKind, Observers};
use crate::failover::status::{CoordinatorState, HealthStatus};
use crate::failover::{FailbackPolicy, FailoverError};
use crate::health::{Advance, HealthProbe, Probe, TcpProbe};
use crate::lifecycle::{Shutdown, ShutdownSignal};

/// Owns the ordered endpoint list and decides which endpoint is active.
pub struct FailoverCoordinator<P: Probe = TcpProbe> {
    inner: Arc<Inner<P>>,
    workers: Mutex<Option<Workers>>,
}

struct Inner<P: Probe> {
    endpoints: Vec<Endpoint>,
    health: HealthProbe<P>,
    settings: CoordinatorConfig,
    active_index: AtomicUsize,
    all_down: AtomicBool,
    stopped: AtomicBool,
    recovery_streak: AtomicU32,
    transition: tokio::sync::Mutex<()>,
    observers: Observers,
}

struct Workers {
    shutdown: Shutdown,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy)]
enum Cycle {
    Health,
    Recovery,
}

impl FailoverCoordinator<TcpProbe> {
    /// Build a coordinator with a TCP probe from a validated configuration.
    pub fn from_config(config: &FailoverConfig) -> Result<Self, FailoverError> {
        let health = HealthProbe::new(
            TcpProbe::from_config(&config.probe),
            config.probe.failure_threshold,
        );
        Self::new(config.endpoint_list(), health, config.coordinator.clone())
    }
}

impl<P: Probe> FailoverCoordinator<P> {
    /// Create a coordinator. `endpoints` is in priority order (index 0 = primary)
    /// and must not be empty.
    pub fn new(
        endpoints: Vec<Endpoint>,
        health: HealthProbe<P>,
        settings: CoordinatorConfig,
    ) -> Result<Self, FailoverError> {
        if endpoints.is_empty() {
            return Err(FailoverError::NoEndpoints);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                endpoints,
                health,
                settings,
                active_index: AtomicUsize::new(0),
                all_down: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                recovery_streak: AtomicU32::new(0),
                transition: tokio::sync::Mutex::new(()),
                observers: Observers::new(),
            }),
            workers: Mutex::new(None),
        })
    }

    /// Spawn the health-check and recovery-check tasks on the current Tokio
    /// runtime. Calling it again while running only logs a warning.
    pub fn start(&self) -> Result<(), FailoverError> {
        let mut workers = self.lock_workers();
        if workers.is_some() {
            tracing::warn!("Failover coordinator already running");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FailoverError::NoRuntime)?;

        self.inner.stopped.store(false, Ordering::SeqCst);
        let shutdown = Shutdown::new();
        let handles = vec![
            self.spawn_cycle(&runtime, Cycle::Health, shutdown.subscribe()),
            self.spawn_cycle(&runtime, Cycle::Recovery, shutdown.subscribe()),
        ];
        *workers = Some(Workers { shutdown, handles });

        tracing::info!(
            endpoints = self.inner.endpoints.len(),
            primary = %self.inner.endpoints[0],
            health_check_interval_ms = self.inner.settings.health_check_interval_ms,
            recovery_check_interval_ms = self.inner.settings.recovery_check_interval_ms,
            failback = ?self.inner.settings.failback,
            "Failover coordinator started"
        );
        Ok(())
    }

    /// Stop both periodic tasks. No cycle starts and no transition commits
    /// once this has been called. Tasks still busy after the grace period are
    /// aborted.
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let Some(workers) = self.lock_workers().take() else {
            tracing::debug!("Failover coordinator not running");
            return;
        };

        workers.shutdown.trigger();
        let mut handles = workers.handles;
        let grace = self.inner.settings.shutdown_grace();
        if time::timeout(grace, join_all(handles.iter_mut())).await.is_err() {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "Periodic tasks did not stop within grace period, aborting"
            );
            for handle in &handles {
                handle.abort();
            }
        }
        tracing::info!("Failover coordinator stopped");
    }

    /// Whether the periodic tasks are currently scheduled.
    pub fn is_running(&self) -> bool {
        self.lock_workers().is_some()
    }

    /// Run one health-check cycle against the active endpoint.
    pub async fn run_health_check(&self) {
        self.inner.health_cycle().await;
    }

    /// Run one recovery-check cycle against the primary.
    pub async fn run_recovery_check(&self) {
        self.inner.recovery_cycle().await;
    }

    /// Switch back to the primary if it passes a probe.
    ///
    /// Returns `Ok` without doing anything when already on the primary.
    pub async fn failback_to_primary(&self) -> Result<(), FailoverError> {
        self.inner.failback_to_primary().await
    }

    /// Register the failover listener. Replaces any earlier listener.
    pub fn set_failover_listener<F>(&self, listener: F)
    where
        F: Fn(&FailoverEvent) + Send + Sync + 'static,
    {
        self.inner.observers.set_listener(Box::new(listener));
    }

    /// Register the connection-reset callback, invoked after `FAILOVER` and
    /// `FAILBACK`. Replaces any earlier callback.
    pub fn set_connection_reset_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.set_reset_callback(Box::new(callback));
    }

    /// Receive every event on a channel instead of a callback.
    pub fn subscribe(&self) -> broadcast::Receiver<FailoverEvent> {
        self.inner.observers.subscribe()
    }

    pub fn active_endpoint(&self) -> &Endpoint {
        &self.inner.endpoints[self.active_index()]
    }

    pub fn active_index(&self) -> usize {
        self.inner.active_index.load(Ordering::SeqCst)
    }

    pub fn is_on_primary(&self) -> bool {
        self.active_index() == 0
    }

    pub fn state(&self) -> CoordinatorState {
        CoordinatorState::from_parts(
            self.active_index(),
            self.inner.all_down.load(Ordering::SeqCst),
        )
    }

    /// Endpoints in priority order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.inner.endpoints
    }

    pub fn failback_policy(&self) -> FailbackPolicy {
        self.inner.settings.failback
    }

    /// Snapshot for metrics and the admin API.
    pub fn health_status(&self) -> HealthStatus {
        let active_index = self.active_index();
        let all_down = self.inner.all_down.load(Ordering::SeqCst);
        let probe = self.inner.health.snapshot();
        HealthStatus {
            active_endpoint: self.inner.endpoints[active_index].clone(),
            active_index,
            healthy: probe.consecutive_failures() < self.inner.health.failure_threshold(),
            consecutive_failures: probe.consecutive_failures(),
            time_since_last_success: probe.time_since_last_success(),
            all_down,
            state: CoordinatorState::from_parts(active_index, all_down),
        }
    }

    fn spawn_cycle(
        &self,
        runtime: &tokio::runtime::Handle,
        cycle: Cycle,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let period = match cycle {
            Cycle::Health => inner.settings.health_check_interval(),
            Cycle::Recovery => inner.settings.recovery_check_interval(),
        }
        .max(Duration::from_millis(1));

        runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => {
                        tracing::debug!(?cycle, "Periodic task received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => match cycle {
                        Cycle::Health => inner.health_cycle().await,
                        Cycle::Recovery => inner.recovery_cycle().await,
                    },
                }
            }
        })
    }

    fn lock_workers(&self) -> MutexGuard<'_, Option<Workers>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: Probe> Drop for FailoverCoordinator<P> {
    fn drop(&mut self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if let Some(workers) = self.lock_workers().take() {
            workers.shutdown.trigger();
            for handle in &workers.handles {
                handle.abort();
            }
        }
    }
}

impl<P: Probe> std::fmt::Debug for FailoverCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverCoordinator")
            .field("endpoints", &self.inner.endpoints)
            .field("active_index", &self.active_index())
            .field("state", &self.state())
            .field("observers", &self.inner.observers)
            .finish()
    }
}

impl<P: Probe> Inner<P> {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn health_cycle(&self) {
        if self.is_stopped() {
            return;
        }

        let index = self.active_index.load(Ordering::SeqCst);
        let active = &self.endpoints[index];

        match self.health.probe_and_advance(active).await {
            Advance::ThresholdReached { .. } => self.perform_failover(index).await,
            Advance::Healthy { .. } => {
                // Recorded successes always belong to the still-active endpoint.
                if self.all_down.swap(false, Ordering::SeqCst) {
                    tracing::info!(endpoint = %active, "Active endpoint reachable again, outage cleared");
                }
            }
            Advance::Failing { .. } | Advance::Superseded => {}
        }
    }

    /// Scan `(failed + 1 .. failed + N - 1) mod N` for the first healthy endpoint.
    async fn perform_failover(&self, failed_index: usize) {
        let _gate = self.transition.lock().await;
        if self.is_stopped() {
            return;
        }

        let current = self.active_index.load(Ordering::SeqCst);
        if current != failed_index {
            tracing::debug!(
                expected = failed_index,
                current,
                "Active endpoint changed before failover started, skipping"
            );
            return;
        }

        let from = &self.endpoints[current];
        let n = self.endpoints.len();
        for step in 1..n {
            let candidate_index = (current + step) % n;
            let candidate = &self.endpoints[candidate_index];

            if !self.health.probe(candidate).await {
                tracing::debug!(candidate = %candidate, "Failover candidate unhealthy");
                continue;
            }
            if self.is_stopped() {
                tracing::info!(candidate = %candidate, "Coordinator stopping, abandoning failover");
                return;
            }

            self.active_index.store(candidate_index, Ordering::SeqCst);
            self.health.reset();
            self.all_down.store(false, Ordering::SeqCst);
            self.recovery_streak.store(0, Ordering::SeqCst);

            tracing::warn!(from = %from, to = %candidate, index = candidate_index, "FAILOVER");
            self.observers.dispatch(FailoverEvent::new(
                from.clone(),
                Some(candidate.clone()),
                FailoverKind::Failover,
            ));
            self.observers.reset_connections();
            return;
        }

        if self.is_stopped() {
            return;
        }
        if self.all_down.swap(true, Ordering::SeqCst) {
            tracing::error!(endpoint = %from, "All endpoints still unreachable");
            return;
        }
        tracing::error!(endpoint = %from, "FAILOVER FAILED: no healthy endpoints available");
        self.observers.dispatch(FailoverEvent::new(
            from.clone(),
            None,
            FailoverKind::AllEndpointsDown,
        ));
    }

    async fn recovery_cycle(&self) {
        if self.is_stopped() {
            return;
        }
        if self.active_index.load(Ordering::SeqCst) == 0 {
            self.recovery_streak.store(0, Ordering::SeqCst);
            return;
        }

        let primary = &self.endpoints[0];
        if !self.health.probe(primary).await {
            self.recovery_streak.store(0, Ordering::SeqCst);
            tracing::debug!(primary = %primary, "Primary still unreachable");
            return;
        }

        let _gate = self.transition.lock().await;
        let current = self.active_index.load(Ordering::SeqCst);
        if self.is_stopped() || current == 0 {
            return;
        }

        let streak = self.recovery_streak.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(primary = %primary, streak, "Primary endpoint has recovered");
        self.observers.dispatch(FailoverEvent::new(
            self.endpoints[current].clone(),
            Some(primary.clone()),
            FailoverKind::PrimaryRecovered,
        ));

        if self.settings.failback.should_fail_back(streak) {
            tracing::info!(streak, "Automatic failback policy satisfied");
            self.commit_failback(current);
        }
    }

    async fn failback_to_primary(&self) -> Result<(), FailoverError> {
        if self.active_index.load(Ordering::SeqCst) == 0 {
            tracing::info!("Already on primary endpoint");
            return Ok(());
        }

        let _gate = self.transition.lock().await;
        let current = self.active_index.load(Ordering::SeqCst);
        if current == 0 {
            tracing::info!("Already on primary endpoint");
            return Ok(());
        }

        let primary = &self.endpoints[0];
        if !self.health.probe(primary).await {
            tracing::warn!(primary = %primary, "Cannot fail back: primary endpoint is unhealthy");
            return Err(FailoverError::PrimaryUnhealthy(primary.clone()));
        }

        self.commit_failback(current);
        Ok(())
    }

    /// Caller holds the transition gate.
    fn commit_failback(&self, current: usize) {
        let from = &self.endpoints[current];
        let primary = &self.endpoints[0];

        self.active_index.store(0, Ordering::SeqCst);
        self.health.reset();
        self.all_down.store(false, Ordering::SeqCst);
        self.recovery_streak.store(0, Ordering::SeqCst);

        tracing::info!(from = %from, to = %primary, "FAILBACK");
        self.observers.dispatch(FailoverEvent::new(
            from.clone(),
            Some(primary.clone()),
            FailoverKind::Failback,
        ));
        self.observers.reset_connections();
    }
}
