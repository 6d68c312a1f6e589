//! Contracts of the remote job store.
//!
//! The store owns all shared state: the job pool, per-job locks and the
//! pheromone/blocker/dependency graph. Agents never cache it across cycles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blocker::NewBlocker;
use crate::job::{Job, JobStatus};
use crate::pheromone::{NewPheromone, PheromoneDeposit, PheromoneType};
use crate::split::NewSplitProposal;
use crate::{JobId, Result};

/// Ordering of an open-job listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobSort {
    /// Highest importance first.
    #[default]
    Importance,
    /// Oldest first.
    CreatedAt,
}

impl fmt::Display for JobSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Importance => write!(f, "importance"),
            Self::CreatedAt => write!(f, "createdAt"),
        }
    }
}

/// Access to the job pool and its locks.
#[async_trait]
pub trait JobPool: Send + Sync {
    /// Snapshot of the open jobs of a group.
    async fn list_open_jobs(&self, group_id: &str, sort_by: JobSort) -> Result<Vec<Job>>;

    /// Fetch a single job; `None` if the store no longer knows it.
    async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Try to take the exclusive lock. `false` means another agent holds it.
    async fn lock_job(&self, job_id: &JobId, agent_id: &str, agent_name: &str) -> Result<bool>;

    async fn unlock_job(&self, job_id: &JobId, agent_id: &str) -> Result<()>;

    /// Release a lock regardless of its holder, on behalf of `requested_by`.
    async fn force_unlock_job(&self, job_id: &JobId, requested_by: &str) -> Result<()>;

    async fn update_job_status(&self, job_id: &JobId, status: JobStatus) -> Result<()>;
}

/// Pheromone, blocker, dependency and split-proposal persistence.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn deposit_pheromone(&self, job_id: &JobId, pheromone: NewPheromone) -> Result<()>;

    /// Remove every deposit of the given type from the job.
    async fn remove_pheromone(&self, job_id: &JobId, pheromone_type: PheromoneType) -> Result<()>;

    async fn get_pheromones(&self, job_id: &JobId) -> Result<Vec<PheromoneDeposit>>;

    async fn add_blocker(&self, job_id: &JobId, blocker: NewBlocker) -> Result<()>;

    async fn remove_blocker(&self, job_id: &JobId, blocker_id: &str) -> Result<()>;

    async fn resolve_blocker(&self, job_id: &JobId, blocker_id: &str, resolved_by: &str)
    -> Result<()>;

    async fn add_dependency(&self, from: &JobId, to: &JobId) -> Result<()>;

    async fn remove_dependency(&self, from: &JobId, to: &JobId) -> Result<()>;

    /// Register a proposal; returns the job as updated by the store.
    async fn add_split_proposal(&self, job_id: &JobId, proposal: NewSplitProposal) -> Result<Job>;

    async fn accept_split_proposal(&self, job_id: &JobId, proposal_id: &str) -> Result<()>;
}
