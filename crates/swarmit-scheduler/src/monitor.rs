//! Blocked-too-long detection.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use swarmit_core::{PheromoneDeposit, PheromoneType};

/// Wall-clock check on how long a job has been carrying `is_blocked`.
///
/// Age is taken from the oldest `is_blocked` deposit still on the job, i.e.
/// the start of the blocked episode. Reminder deposits made while the job
/// keeps waiting therefore do not reset the clock.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMonitor {
    threshold: TimeDelta,
}

impl TimeoutMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
        }
    }

    /// When the current blocked episode began, if the job is blocked at all.
    pub fn blocked_since(pheromones: &[PheromoneDeposit]) -> Option<DateTime<Utc>> {
        pheromones
            .iter()
            .filter(|p| p.pheromone_type == PheromoneType::IsBlocked)
            .map(|p| p.deposited_at)
            .min()
    }

    pub fn is_blocked_too_long_at(&self, pheromones: &[PheromoneDeposit], now: DateTime<Utc>) -> bool {
        Self::blocked_since(pheromones).is_some_and(|since| now - since > self.threshold)
    }

    pub fn is_blocked_too_long(&self, pheromones: &[PheromoneDeposit]) -> bool {
        self.is_blocked_too_long_at(pheromones, Utc::now())
    }
}
