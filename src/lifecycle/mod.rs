//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Start coordinator → Start admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → latch triggered → periodic tasks and admin API exit → coordinator.stop()
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then coordinator, then the admin API
//! - Shutdown has a grace period: tasks still busy afterwards are aborted

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_signal;
