//! Failback policy.

use serde::{Deserialize, Serialize};

/// What the coordinator does once the primary answers recovery checks again.
///
/// `Manual` only reports the recovery; an operator (or automation outside
/// this crate) calls `failback_to_primary`. `Automatic` switches back after
/// `stable_checks` consecutive successful recovery checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FailbackPolicy {
    #[default]
    Manual,
    Automatic { stable_checks: u32 },
}

impl FailbackPolicy {
    /// Whether a recovery streak of `streak` checks should trigger failback.
    pub fn should_fail_back(&self, streak: u32) -> bool {
        match self {
            FailbackPolicy::Manual => false,
            FailbackPolicy::Automatic { stable_checks } => streak >= (*stable_checks).max(1),
        }
    }
}
