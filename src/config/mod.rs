//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FailoverConfig (validated, immutable)
//!     → probe / coordinator / observability / admin settings
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the endpoint list never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CoordinatorConfig, EndpointConfig, FailoverConfig, LogFormat,
    ObservabilityConfig, ProbeConfig, PLACEHOLDER_API_KEY,
};
