//! The decision returned by one pick cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::Job;

/// What the calling agent loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickAction {
    /// Lock the job and work on it.
    Implement,
    /// The job was proposed for decomposition.
    Split,
    /// The job looks stuck; ask the store to release it.
    FreeRequest,
    /// Nothing left to do; shut the agent down.
    Terminate,
}

impl fmt::Display for PickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implement => write!(f, "implement"),
            Self::Split => write!(f, "split"),
            Self::FreeRequest => write!(f, "free-request"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// Outcome of a pick cycle. `{None, None}` means a job was processed but
/// nothing was selected this cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PickResult {
    pub job: Option<Job>,
    pub action: Option<PickAction>,
}

impl PickResult {
    pub fn implement(job: Job) -> Self {
        Self {
            job: Some(job),
            action: Some(PickAction::Implement),
        }
    }

    pub fn split(job: Job) -> Self {
        Self {
            job: Some(job),
            action: Some(PickAction::Split),
        }
    }

    pub fn free_request(job: Job) -> Self {
        Self {
            job: Some(job),
            action: Some(PickAction::FreeRequest),
        }
    }

    pub fn terminate() -> Self {
        Self {
            job: None,
            action: Some(PickAction::Terminate),
        }
    }

    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn is_nothing(&self) -> bool {
        self.job.is_none() && self.action.is_none()
    }

    pub fn job_id(&self) -> Option<&crate::JobId> {
        self.job.as_ref().map(|j| &j.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let result = PickResult::free_request(Job::new("J1", "stuck"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["action"], "free-request");
        assert_eq!(value["job"]["id"], "J1");

        let value = serde_json::to_value(PickResult::nothing()).unwrap();
        assert!(value["action"].is_null());
        assert!(value["job"].is_null());
    }
}
