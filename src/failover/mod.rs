//! Failover coordination subsystem.
//!
//! # Data Flow
//! ```text
//! health-check tick (every health_check_interval)
//!     → probe active endpoint (health::HealthProbe)
//!     → threshold reached? → scan ring for next healthy endpoint
//!     → commit: active_index, probe reset
//!     → event.rs (listener + broadcast) → connection reset callback
//!
//! recovery-check tick (every recovery_check_interval, only while failed over)
//!     → probe primary
//!     → PRIMARY_RECOVERED event
//!     → policy.rs decides whether to fail back automatically
//! ```
//!
//! # Design Decisions
//! - Failover prefers the next endpoint in ring order, not the primary
//! - Failback is manual unless the automatic policy is configured
//! - Observer failures never reach the coordinator

pub mod coordinator;
pub mod event;
pub mod policy;
pub mod status;

use thiserror::Error;

use crate::endpoint::Endpoint;

pub use coordinator::FailoverCoordinator;
pub use event::{FailoverEvent, FailoverKind};
pub use policy::FailbackPolicy;
pub use status::{CoordinatorState, HealthStatus};

/// Errors surfaced by construction and explicit calls.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// Zero-endpoint construction.
    #[error("at least one endpoint is required")]
    NoEndpoints,

    /// Explicit failback refused.
    #[error("primary endpoint {0} is unhealthy, refusing failback")]
    PrimaryUnhealthy(Endpoint),

    /// `start()` called outside a Tokio runtime.
    #[error("no Tokio runtime available to schedule health checks")]
    NoRuntime,
}
