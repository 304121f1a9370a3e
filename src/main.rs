//! Adaptive endpoint failover daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                      FAILOVER DAEMON                          │
//!   │                                                               │
//!   │   health tick ──▶ ┌─────────────┐   probe   ┌─────────────┐   │
//!   │                   │ coordinator │ ────────▶ │ health probe│───┼──▶ endpoints
//!   │ recovery tick ──▶ │ (failover)  │ ◀──────── │ TCP + PING  │   │    [0] primary
//!   │                   └──────┬──────┘  healthy? └─────────────┘   │    [1] backup ...
//!   │                          │ events                             │
//!   │          ┌───────────────┼────────────────┐                   │
//!   │          ▼               ▼                ▼                   │
//!   │     listener /      metrics exporter   admin API              │
//!   │     reset callback  (Prometheus)       (status, failback)     │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use endpoint_failover::admin::{self, AdminState};
use endpoint_failover::config::load_config;
use endpoint_failover::failover::FailoverCoordinator;
use endpoint_failover::lifecycle::{wait_for_signal, Shutdown};
use endpoint_failover::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "endpoint-failover")]
#[command(about = "Health-probing failover coordinator for redundant endpoints", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FAILOVER_CONFIG", default_value = "failover.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        endpoints = config.endpoints.len(),
        failure_threshold = config.probe.failure_threshold,
        application_check = config.probe.application_check,
        "endpoint-failover starting"
    );
    for (index, ep) in config.endpoints.iter().enumerate() {
        tracing::info!(
            index,
            name = ep.name.as_deref().unwrap_or("-"),
            endpoint = %ep.endpoint(),
            "Endpoint registered"
        );
    }

    let coordinator = Arc::new(FailoverCoordinator::from_config(&config)?);
    coordinator.set_failover_listener(|event| {
        let to = event
            .to_endpoint()
            .map_or_else(|| "none".to_string(), ToString::to_string);
        tracing::info!(
            target: "failover_events",
            event_id = %event.id(),
            kind = %event.kind(),
            from = %event.from_endpoint(),
            to = %to,
            timestamp_ms = event.timestamp_millis(),
            "Failover event"
        );
    });
    let reset_target = Arc::downgrade(&coordinator);
    coordinator.set_connection_reset_callback(move || {
        if let Some(coordinator) = reset_target.upgrade() {
            tracing::info!(
                endpoint = %coordinator.active_endpoint(),
                "Connection reset requested, clients should reconnect"
            );
        }
    });

    let shutdown = Shutdown::new();
    let mut background = Vec::new();

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
        background.push(tokio::spawn(metrics::run_exporter(
            Arc::clone(&coordinator),
            std::time::Duration::from_millis(config.observability.metrics_interval_ms),
            shutdown.subscribe(),
        )));
    }

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(Arc::clone(&coordinator), config.admin.api_key.as_str());
        let admin_shutdown = shutdown.subscribe();
        background.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    coordinator.start()?;

    wait_for_signal().await;
    tracing::info!("Shutdown signal received");

    shutdown.trigger();
    coordinator.stop().await;
    for task in background {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
