//! Adaptive application-level failover between redundant endpoints.
//!
//! A [`FailoverCoordinator`] probes the active endpoint on a fixed cadence,
//! switches to the next reachable endpoint once a failure threshold is hit,
//! and reports when the primary recovers.

pub mod admin;
pub mod config;
pub mod endpoint;
pub mod failover;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::FailoverConfig;
pub use endpoint::Endpoint;
pub use failover::{FailbackPolicy, FailoverCoordinator, FailoverError, FailoverEvent, FailoverKind, HealthStatus};
pub use health::{HealthProbe, Probe, TcpProbe};
pub use lifecycle::Shutdown;
