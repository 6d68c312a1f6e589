//! Blocker records and dependency edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;
use crate::agent::AgentContext;

/// A readable explanation of why a job cannot proceed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    pub id: String,
    pub text: String,
    pub added_by: String,
    pub added_by_name: String,
    /// Jobs that must close before the blocked job can run.
    #[serde(default)]
    pub blocker_job_ids: Vec<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Blocker {
    pub fn is_resolved(&self) -> bool {
        self.resolved_by.is_some()
    }

    /// Whether this record cites exactly the given set of jobs, ignoring order.
    pub fn cites_exactly(&self, ids: &[JobId]) -> bool {
        let mut mine: Vec<&JobId> = self.blocker_job_ids.iter().collect();
        let mut theirs: Vec<&JobId> = ids.iter().collect();
        mine.sort();
        mine.dedup();
        theirs.sort();
        theirs.dedup();
        mine == theirs
    }
}

/// Request to add a blocker record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlocker {
    pub text: String,
    pub added_by: String,
    pub added_by_name: String,
    pub blocker_job_ids: Vec<JobId>,
}

impl NewBlocker {
    pub fn by(agent: &AgentContext, text: impl Into<String>, blocker_job_ids: Vec<JobId>) -> Self {
        Self {
            text: text.into(),
            added_by: agent.agent_id.clone(),
            added_by_name: agent.agent_name.clone(),
            blocker_job_ids,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    Blocks,
}

/// Directed edge: `from_job_id` cannot run until `to_job_id` closes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub from_job_id: JobId,
    pub to_job_id: JobId,
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,
}

impl Dependency {
    pub fn blocks(from: JobId, to: JobId) -> Self {
        Self {
            from_job_id: from,
            to_job_id: to,
            dependency_type: DependencyType::Blocks,
        }
    }
}
