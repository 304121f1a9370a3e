//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use endpoint_failover::config::CoordinatorConfig;
use endpoint_failover::failover::FailoverCoordinator;
use endpoint_failover::{Endpoint, FailbackPolicy, FailoverEvent, FailoverKind, HealthProbe, Probe};

/// Start a loopback server that answers every line with `reply`.
pub async fn start_liveness_server(reply: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 64];
                        if socket.read(&mut buf).await.unwrap_or(0) > 0 {
                            let _ = socket.write_all(reply).await;
                            let _ = socket.flush().await;
                        }
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// A healthy peer speaking the liveness protocol.
pub async fn start_pong_server() -> SocketAddr {
    start_liveness_server(b"PONG\r\n").await
}

/// A peer that accepts connections but never writes anything.
pub async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn endpoint_for(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

/// Probe whose answers are set by the test. Unknown endpoints are unhealthy.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    health: Arc<Mutex<HashMap<Endpoint, bool>>>,
    probes: Arc<Mutex<HashMap<Endpoint, usize>>>,
    delays: Arc<Mutex<HashMap<Endpoint, Duration>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, endpoint: &Endpoint, healthy: bool) {
        self.health.lock().unwrap().insert(endpoint.clone(), healthy);
    }

    /// Make every probe of `endpoint` take `delay` before answering.
    pub fn set_delay(&self, endpoint: &Endpoint, delay: Duration) {
        self.delays.lock().unwrap().insert(endpoint.clone(), delay);
    }

    pub fn probe_count(&self, endpoint: &Endpoint) -> usize {
        self.probes.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }
}

impl Probe for ScriptedProbe {
    async fn probe(&self, endpoint: &Endpoint) -> bool {
        *self.probes.lock().unwrap().entry(endpoint.clone()).or_insert(0) += 1;
        let delay = self.delays.lock().unwrap().get(endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.health.lock().unwrap().get(endpoint).copied().unwrap_or(false)
    }
}

/// Collects events from the listener and counts connection resets.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<FailoverEvent>>>,
    resets: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn attach<P: Probe>(&self, coordinator: &FailoverCoordinator<P>) {
        let events = Arc::clone(&self.events);
        coordinator.set_failover_listener(move |event| {
            events.lock().unwrap().push(event.clone());
        });
        let resets = Arc::clone(&self.resets);
        coordinator.set_connection_reset_callback(move || {
            resets.fetch_add(1, Ordering::SeqCst);
        });
    }

    pub fn events(&self) -> Vec<FailoverEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<FailoverKind> {
        self.events().iter().map(FailoverEvent::kind).collect()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

pub fn endpoints(n: u16) -> Vec<Endpoint> {
    (0..n).map(|i| Endpoint::new(format!("node-{i}"), 7000 + i)).collect()
}

pub fn settings(failback: FailbackPolicy) -> CoordinatorConfig {
    CoordinatorConfig {
        failback,
        ..CoordinatorConfig::default()
    }
}

/// Coordinator over `endpoints` driven by a scripted probe; every endpoint starts healthy.
pub fn scripted_coordinator(
    endpoints: Vec<Endpoint>,
    threshold: u32,
    settings: CoordinatorConfig,
) -> (FailoverCoordinator<ScriptedProbe>, ScriptedProbe, Recorder) {
    let probe = ScriptedProbe::new();
    for ep in &endpoints {
        probe.set_healthy(ep, true);
    }
    let coordinator =
        FailoverCoordinator::new(endpoints, HealthProbe::new(probe.clone(), threshold), settings)
            .unwrap();
    let recorder = Recorder::default();
    recorder.attach(&coordinator);
    (coordinator, probe, recorder)
}
