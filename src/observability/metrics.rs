//! Metrics export.
//!
//! # Metrics
//! - `failover_active_index` (gauge): index of the active endpoint (0 = primary)
//! - `failover_endpoint_active` (gauge, `endpoint`): 1 for the active endpoint, 0 otherwise
//! - `failover_endpoint_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `failover_consecutive_failures` (gauge)
//! - `failover_ms_since_last_success` (gauge)
//! - `failover_all_down` (gauge): 1 during a total outage
//! - `failover_events_total` (counter, `kind`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{self, MissedTickBehavior};

use crate::endpoint::Endpoint;
use crate::failover::{FailoverCoordinator, FailoverKind, HealthStatus};
use crate::health::Probe;
use crate::lifecycle::ShutdownSignal;

/// Install the Prometheus recorder and its HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Publish one status snapshot as gauges.
pub fn record_status(status: &HealthStatus, endpoints: &[Endpoint]) {
    gauge!("failover_active_index").set(status.active_index as f64);
    gauge!("failover_endpoint_healthy").set(if status.healthy { 1.0 } else { 0.0 });
    gauge!("failover_consecutive_failures").set(f64::from(status.consecutive_failures));
    gauge!("failover_ms_since_last_success").set(status.ms_since_last_success() as f64);
    gauge!("failover_all_down").set(if status.all_down { 1.0 } else { 0.0 });

    for (index, endpoint) in endpoints.iter().enumerate() {
        let active = if index == status.active_index { 1.0 } else { 0.0 };
        gauge!("failover_endpoint_active", "endpoint" => endpoint.to_string()).set(active);
    }
}

/// Count one dispatched event.
pub fn record_event(kind: FailoverKind) {
    counter!("failover_events_total", "kind" => kind.as_str()).increment(1);
}

/// Sample the coordinator until shutdown.
pub async fn run_exporter<P: Probe>(
    coordinator: Arc<FailoverCoordinator<P>>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut events = coordinator.subscribe();
    let mut events_open = true;
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                record_status(&coordinator.health_status(), coordinator.endpoints());
            }
            received = events.recv(), if events_open => match received {
                Ok(event) => {
                    record_event(event.kind());
                    record_status(&coordinator.health_status(), coordinator.endpoints());
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Metrics exporter lagged behind failover events");
                }
                Err(RecvError::Closed) => events_open = false,
            },
        }
    }
    tracing::debug!("Metrics exporter stopped");
}
