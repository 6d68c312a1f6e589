//! Pheromone deposits: typed, timestamped, advisory marks on jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::AgentContext;

/// Kind of signal a pheromone carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PheromoneType {
    /// The job should be decomposed; a split proposal exists.
    SplitThisJob,
    /// The job has unresolved structural blockers.
    IsBlocked,
    /// The job was judged blocked by task semantics.
    TaskNotReady,
    /// Someone suspects the blockers of this job are done.
    MightBeCompleted,
    /// Other jobs wait on this one; pick it up early.
    Importance,
}

impl PheromoneType {
    pub const ALL: [PheromoneType; 5] = [
        PheromoneType::SplitThisJob,
        PheromoneType::IsBlocked,
        PheromoneType::TaskNotReady,
        PheromoneType::MightBeCompleted,
        PheromoneType::Importance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SplitThisJob => "split_this_job",
            Self::IsBlocked => "is_blocked",
            Self::TaskNotReady => "task_not_ready",
            Self::MightBeCompleted => "might_be_completed",
            Self::Importance => "importance",
        }
    }
}

impl fmt::Display for PheromoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PheromoneType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown pheromone type: {s}")))
    }
}

/// A pheromone as stored on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PheromoneDeposit {
    #[serde(rename = "type")]
    pub pheromone_type: PheromoneType,
    /// Signal strength in `[0, 1]`.
    pub intensity: f64,
    pub deposited_by: String,
    pub deposited_by_name: String,
    pub deposited_at: DateTime<Utc>,
}

/// Request to deposit a pheromone. The store stamps the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPheromone {
    #[serde(rename = "type")]
    pub pheromone_type: PheromoneType,
    pub intensity: f64,
    pub deposited_by: String,
    pub deposited_by_name: String,
}

impl NewPheromone {
    /// Build a deposit attributed to `agent`, clamping intensity into `[0, 1]`.
    pub fn by(agent: &AgentContext, pheromone_type: PheromoneType, intensity: f64) -> Self {
        Self {
            pheromone_type,
            intensity: intensity.clamp(0.0, 1.0),
            deposited_by: agent.agent_id.clone(),
            deposited_by_name: agent.agent_name.clone(),
        }
    }

    pub fn stamp(self, at: DateTime<Utc>) -> PheromoneDeposit {
        PheromoneDeposit {
            pheromone_type: self.pheromone_type,
            intensity: self.intensity,
            deposited_by: self.deposited_by,
            deposited_by_name: self.deposited_by_name,
            deposited_at: at,
        }
    }
}

/// Whether any deposit of the given type is present.
pub fn carries(pheromones: &[PheromoneDeposit], pheromone_type: PheromoneType) -> bool {
    pheromones.iter().any(|p| p.pheromone_type == pheromone_type)
}
