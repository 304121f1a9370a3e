//! Health probing subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator tick
//!     → tracker.rs (probe_and_advance)
//!     → probe.rs (TCP connect, optional PING/PONG)
//!     → state.rs (failure counter / last success)
//!     → "transition needed?" back to the coordinator
//! ```
//!
//! # Design Decisions
//! - Probes never return errors; every failure mode is "unhealthy"
//! - Consecutive failures are required before a transition (hysteresis)
//! - Only the active endpoint's history is tracked; it is reset on every switch
//! - A result from a probe that started before a reset is discarded

pub mod probe;
pub mod state;
pub mod tracker;

pub use probe::{Probe, TcpProbe, LIVENESS_CHALLENGE, LIVENESS_REPLY};
pub use state::ProbeState;
pub use tracker::{Advance, HealthProbe};
