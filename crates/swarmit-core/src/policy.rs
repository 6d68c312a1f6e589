//! Swarm-wide scheduling policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Age after which a blocked job counts as stuck.
pub const BLOCKED_TIMEOUT_MS: u64 = 30 * 60 * 1000;
/// Intensity of the `importance` deposit on jobs that block others.
pub const IMPORTANCE_INTENSITY: f64 = 0.8;
/// Intensity of a first blocking deposit.
pub const BLOCK_INTENSITY: f64 = 1.0;
/// Intensity of the reminder deposit on jobs still waiting in the last-resort stage.
pub const REINFORCE_INTENSITY: f64 = 0.5;
/// Intensity of a `split_this_job` deposit.
pub const SPLIT_INTENSITY: f64 = 1.0;

/// Tunables shared by every agent of a swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmPolicy {
    /// Approvals a split proposal needs; 1 means the proposer accepts it at once.
    pub minimum_job_split_proposal_required: u32,
    pub blocked_timeout_ms: u64,
    pub importance_intensity: f64,
    pub reinforce_intensity: f64,
    /// Inference attempts before a malformed answer is given up on.
    pub oracle_attempts: u32,
    /// Attempts per individual write-back call.
    pub write_retries: u32,
    pub write_backoff_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SwarmPolicy {
    fn default() -> Self {
        Self {
            minimum_job_split_proposal_required: 1,
            blocked_timeout_ms: BLOCKED_TIMEOUT_MS,
            importance_intensity: IMPORTANCE_INTENSITY,
            reinforce_intensity: REINFORCE_INTENSITY,
            oracle_attempts: 3,
            write_retries: 3,
            write_backoff_ms: 200,
            poll_interval_ms: 5000,
        }
    }
}

impl SwarmPolicy {
    pub fn blocked_timeout(&self) -> Duration {
        Duration::from_millis(self.blocked_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn write_backoff(&self) -> Duration {
        Duration::from_millis(self.write_backoff_ms)
    }

    pub fn auto_accepts_splits(&self) -> bool {
        self.minimum_job_split_proposal_required == 1
    }
}
