//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the failover
//! daemon. All types derive Serde traits for deserialization from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::failover::FailbackPolicy;

/// Root configuration for the failover daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FailoverConfig {
    /// Endpoints in priority order (first = primary).
    pub endpoints: Vec<EndpointConfig>,

    /// Health probe settings.
    pub probe: ProbeConfig,

    /// Coordinator scheduling and failback policy.
    pub coordinator: CoordinatorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl FailoverConfig {
    /// Endpoints in priority order.
    pub fn endpoint_list(&self) -> Vec<Endpoint> {
        self.endpoints.iter().map(EndpointConfig::endpoint).collect()
    }
}

/// A single endpoint entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Optional label used in logs.
    #[serde(default)]
    pub name: Option<String>,

    /// Hostname or IP literal.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl EndpointConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Transport connect deadline in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for the PING/PONG exchange in milliseconds.
    pub read_timeout_ms: u64,

    /// Consecutive failures before the active endpoint is abandoned.
    pub failure_threshold: u32,

    /// Perform the application-level PING/PONG exchange after connecting.
    pub application_check: bool,
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            read_timeout_ms: 2000,
            failure_threshold: 3,
            application_check: true,
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Interval between health checks of the active endpoint.
    pub health_check_interval_ms: u64,

    /// Interval between recovery checks of the primary while failed over.
    pub recovery_check_interval_ms: u64,

    /// How long `stop()` waits for the periodic tasks before aborting them.
    pub shutdown_grace_ms: u64,

    /// What to do when the primary recovers.
    pub failback: FailbackPolicy,
}

impl CoordinatorConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn recovery_check_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_check_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 5000,
            recovery_check_interval_ms: 30_000,
            shutdown_grace_ms: 10_000,
            failback: FailbackPolicy::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// How often the exporter samples the coordinator status.
    pub metrics_interval_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            metrics_interval_ms: 1000,
        }
    }
}

/// Default admin key. Validation refuses it while the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
