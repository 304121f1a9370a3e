//! Point-in-time views of the coordinator.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::endpoint::Endpoint;

/// Coordinator state.
///
/// ```text
/// OnPrimary  --failover-->  FailedOver  --failback-->  OnPrimary
///     |                         |
///     +------ no candidate -----+-->  AllDown (keeps last selection)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorState {
    OnPrimary,
    FailedOver,
    AllDown,
}

impl CoordinatorState {
    pub(crate) fn from_parts(active_index: usize, all_down: bool) -> Self {
        if all_down {
            CoordinatorState::AllDown
        } else if active_index == 0 {
            CoordinatorState::OnPrimary
        } else {
            CoordinatorState::FailedOver
        }
    }
}

/// Health snapshot of the active endpoint. Everything a metrics exporter
/// needs, obtained without waiting on the periodic tasks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub active_endpoint: Endpoint,
    pub active_index: usize,
    pub healthy: bool,
    pub consecutive_failures: u32,
    #[serde(rename = "ms_since_last_success", serialize_with = "serialize_millis")]
    pub time_since_last_success: Duration,
    pub all_down: bool,
    pub state: CoordinatorState,
}

impl HealthStatus {
    pub fn ms_since_last_success(&self) -> u64 {
        self.time_since_last_success.as_millis() as u64
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
