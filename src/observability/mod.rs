//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator and probes produce:
//!     → logging.rs (structured tracing events)
//!
//! Exporter task (metrics.rs) consumes:
//!     → FailoverCoordinator::health_status() on a fixed interval
//!     → FailoverCoordinator::subscribe() event stream
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - The coordinator never records metrics itself; the exporter reads the
//!   same accessors any other consumer would
//! - Structured logging with env-filter overrides
//! - JSON log lines available for log aggregation

pub mod logging;
pub mod metrics;
