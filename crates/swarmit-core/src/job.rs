//! Jobs: the units of work in the shared pool.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::JobId;
use crate::blocker::{Blocker, Dependency, DependencyType};
use crate::pheromone::{PheromoneDeposit, PheromoneType, carries};
use crate::split::SplitProposal;

/// Open/closed state. Lock state is tracked separately by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A unit of work as seen in a snapshot from the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub pheromones: Vec<PheromoneDeposit>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub split_proposals: Vec<SplitProposal>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: JobStatus::Open,
            group_id: String::new(),
            pheromones: Vec::new(),
            blockers: Vec::new(),
            dependencies: Vec::new(),
            split_proposals: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }

    /// Presence check against the pheromones embedded in this snapshot.
    pub fn has_pheromone(&self, pheromone_type: PheromoneType) -> bool {
        carries(&self.pheromones, pheromone_type)
    }

    /// Outgoing "blocks" edges recorded on this job.
    pub fn blocking_edges(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.from_job_id == self.id && d.dependency_type == DependencyType::Blocks)
    }

    /// Every job id this job has been recorded as waiting on, from both
    /// unresolved blocker records and dependency edges, without duplicates.
    pub fn recorded_blocker_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = Vec::new();
        let from_blockers = self
            .blockers
            .iter()
            .filter(|b| !b.is_resolved())
            .flat_map(|b| b.blocker_job_ids.iter());
        let from_edges = self.blocking_edges().map(|d| &d.to_job_id);

        for id in from_blockers.chain(from_edges) {
            if *id != self.id && !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Whether this job already waits on `other`.
    pub fn depends_on(&self, other: &JobId) -> bool {
        self.recorded_blocker_ids().contains(other)
    }
}

/// Specification of a job to be created, e.g. a proposed sub-job of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
