//! Split proposals: suggested decompositions of a job.

use serde::{Deserialize, Serialize};

use crate::job::JobSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitProposalStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitProposal {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub proposed_jobs: Vec<JobSpec>,
    pub proposed_by: String,
    #[serde(default)]
    pub status: SplitProposalStatus,
}

impl SplitProposal {
    pub fn is_pending(&self) -> bool {
        self.status == SplitProposalStatus::Pending
    }
}

/// Request to register a split proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSplitProposal {
    pub description: String,
    pub proposed_jobs: Vec<JobSpec>,
    pub proposed_by: String,
}
