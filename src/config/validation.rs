//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and the endpoint
//! list. All errors are collected, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{FailoverConfig, PLACEHOLDER_API_KEY};
use crate::failover::FailbackPolicy;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one endpoint is required")]
    NoEndpoints,
    #[error("endpoint #{index} has an empty host")]
    EmptyHost { index: usize },
    #[error("endpoint #{index} has port 0")]
    ZeroPort { index: usize },
    #[error("endpoint {endpoint} is listed more than once")]
    DuplicateEndpoint { endpoint: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("admin.api_key must be set to a non-default value when the admin API is enabled")]
    InsecureApiKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    let mut seen = HashSet::new();
    for (index, ep) in config.endpoints.iter().enumerate() {
        if ep.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost { index });
        }
        if ep.port == 0 {
            errors.push(ValidationError::ZeroPort { index });
        }
        let endpoint = ep.endpoint();
        if !seen.insert(endpoint.clone()) {
            errors.push(ValidationError::DuplicateEndpoint {
                endpoint: endpoint.to_string(),
            });
        }
    }

    let non_zero = [
        ("probe.connect_timeout_ms", config.probe.connect_timeout_ms),
        ("probe.read_timeout_ms", config.probe.read_timeout_ms),
        ("probe.failure_threshold", u64::from(config.probe.failure_threshold)),
        (
            "coordinator.health_check_interval_ms",
            config.coordinator.health_check_interval_ms,
        ),
        (
            "coordinator.recovery_check_interval_ms",
            config.coordinator.recovery_check_interval_ms,
        ),
        (
            "observability.metrics_interval_ms",
            config.observability.metrics_interval_ms,
        ),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if let FailbackPolicy::Automatic { stable_checks: 0 } = config.coordinator.failback {
        errors.push(ValidationError::Zero {
            field: "coordinator.failback.stable_checks",
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
        let key = config.admin.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::InsecureApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
