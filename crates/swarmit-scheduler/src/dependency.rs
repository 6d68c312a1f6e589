//! Dependency resolution: recorded edges first, the oracle second.
//!
//! The structural check only reads edges already stored on the job. The
//! semantic check asks the oracle about jobs with no recorded edge yet and
//! persists a positive verdict as ordinary edges, so the next cycle takes
//! the cheap structural path for the same job.

use serde::Deserialize;
use std::sync::Arc;
use swarmit_core::{Job, JobId, JobPool, PheromoneType, Result};
use tracing::{debug, info, warn};

use crate::oracle::JsonOracle;
use crate::prompts::{DEPENDENCY_SYSTEM, dependency_prompt};
use crate::writeback::SignalWriter;

/// Outcome of walking a job's recorded edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralCheck {
    pub resolved: bool,
    /// Recorded blocker jobs that are still open.
    pub unresolved_blocker_ids: Vec<JobId>,
    /// Recorded blocker jobs that have closed or disappeared.
    pub closed_blocker_ids: Vec<JobId>,
}

/// Outcome of the oracle's semantic judgment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticCheck {
    pub has_blocker: bool,
    pub blocking_job_ids: Vec<JobId>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyVerdict {
    has_blocker: bool,
    #[serde(default)]
    blocking_job_ids: Vec<String>,
    #[serde(default)]
    reason: String,
}

#[derive(Clone)]
pub struct DependencyResolver {
    pool: Arc<dyn JobPool>,
    oracle: JsonOracle,
    writer: SignalWriter,
}

impl DependencyResolver {
    pub fn new(pool: Arc<dyn JobPool>, oracle: JsonOracle, writer: SignalWriter) -> Self {
        Self {
            pool,
            oracle,
            writer,
        }
    }

    /// Resolved iff every job this one is recorded as waiting on is no longer open.
    pub async fn check_structural(&self, job: &Job) -> Result<StructuralCheck> {
        let mut check = StructuralCheck::default();

        for blocker_id in job.recorded_blocker_ids() {
            match self.pool.get_job(&blocker_id).await? {
                Some(blocker) if blocker.is_open() => check.unresolved_blocker_ids.push(blocker_id),
                _ => check.closed_blocker_ids.push(blocker_id),
            }
        }

        check.resolved = check.unresolved_blocker_ids.is_empty();
        debug!(
            job_id = %job.id,
            resolved = check.resolved,
            unresolved = ?check.unresolved_blocker_ids,
            "Structural dependency check"
        );
        Ok(check)
    }

    /// Persist a failed structural check as an `is_blocked` block.
    pub async fn record_structural_block(&self, job: &Job, check: &StructuralCheck) -> Result<()> {
        let reason = format!(
            "Waiting on open jobs: {}",
            join_ids(&check.unresolved_blocker_ids)
        );
        info!(job_id = %job.id, blockers = ?check.unresolved_blocker_ids, "Job is structurally blocked");
        self.writer
            .record_block_replacing(
                job,
                &check.unresolved_blocker_ids,
                &check.closed_blocker_ids,
                &reason,
                PheromoneType::IsBlocked,
            )
            .await
    }

    /// Ask the oracle whether `job` must wait for another open job of the
    /// snapshot. A positive verdict is written back as a `task_not_ready`
    /// block before returning.
    pub async fn check_semantic(&self, job: &Job, candidates: &[Job]) -> Result<SemanticCheck> {
        let others: Vec<&Job> = candidates
            .iter()
            .filter(|other| other.id != job.id && other.is_open() && !other.depends_on(&job.id))
            .collect();

        if others.is_empty() {
            debug!(job_id = %job.id, "No other open jobs, skipping semantic check");
            return Ok(SemanticCheck::default());
        }

        let verdict: DependencyVerdict = self
            .oracle
            .ask(&dependency_prompt(job, &others), DEPENDENCY_SYSTEM)
            .await?;

        let mut blocking_job_ids: Vec<JobId> = Vec::new();
        for raw in verdict.blocking_job_ids {
            match others.iter().find(|o| o.id == raw.as_str()) {
                Some(other) if !blocking_job_ids.contains(&other.id) => {
                    blocking_job_ids.push(other.id.clone())
                }
                Some(_) => {}
                None => warn!(job_id = %job.id, cited = %raw, "Oracle cited a job outside the open set"),
            }
        }

        if !verdict.has_blocker || blocking_job_ids.is_empty() {
            return Ok(SemanticCheck {
                has_blocker: false,
                blocking_job_ids: Vec::new(),
                reason: verdict.reason,
            });
        }

        info!(job_id = %job.id, blockers = ?blocking_job_ids, reason = %verdict.reason, "Job is semantically blocked");
        self.writer
            .record_block(
                job,
                &blocking_job_ids,
                &verdict.reason,
                PheromoneType::TaskNotReady,
            )
            .await?;

        Ok(SemanticCheck {
            has_blocker: true,
            blocking_job_ids,
            reason: verdict.reason,
        })
    }
}

fn join_ids(ids: &[JobId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use swarmit_core::blocker::Dependency;
    use swarmit_core::{AgentContext, JobStatus, MemoryStore, SwarmPolicy};

    fn resolver(store: Arc<MemoryStore>, oracle: Arc<ScriptedOracle>) -> DependencyResolver {
        let policy = SwarmPolicy {
            write_backoff_ms: 0,
            ..SwarmPolicy::default()
        };
        let writer = SignalWriter::new(store.clone(), AgentContext::new("a1", "Ant"), &policy);
        DependencyResolver::new(store, JsonOracle::new(oracle, 2), writer)
    }

    #[tokio::test]
    async fn test_structural_splits_open_and_closed_blockers() {
        let mut job = Job::new("J1", "feature");
        job.dependencies.push(Dependency::blocks("J1".into(), "J2".into()));
        job.dependencies.push(Dependency::blocks("J1".into(), "J3".into()));
        job.dependencies.push(Dependency::blocks("J1".into(), "gone".into()));
        let mut closed = Job::new("J3", "done");
        closed.status = JobStatus::Closed;
        let store = Arc::new(MemoryStore::with_jobs([job.clone(), Job::new("J2", "setup"), closed]));

        let check = resolver(store, Arc::new(ScriptedOracle::default()))
            .check_structural(&job)
            .await
            .unwrap();
        assert!(!check.resolved);
        assert_eq!(check.unresolved_blocker_ids, vec![JobId::from("J2")]);
        assert_eq!(check.closed_blocker_ids, vec![JobId::from("J3"), "gone".into()]);
    }

    #[tokio::test]
    async fn test_structural_propagates_store_errors() {
        let mut job = Job::new("J1", "feature");
        job.dependencies.push(Dependency::blocks("J1".into(), "J2".into()));
        let store = Arc::new(MemoryStore::with_jobs([job.clone(), Job::new("J2", "setup")]));
        store.fail_job("J2");

        let result = resolver(store, Arc::new(ScriptedOracle::default()))
            .check_structural(&job)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_semantic_block_is_written_back() {
        let feature = Job::new("J1", "Add login page");
        let setup = Job::new("J2", "Set up web framework");
        let store = Arc::new(MemoryStore::with_jobs([feature.clone(), setup.clone()]));
        let oracle = Arc::new(ScriptedOracle::new([
            r#"{"hasBlocker": true, "blockingJobIds": ["J2", "J2", "J404"], "reason": "needs the framework"}"#,
        ]));
        let r = resolver(store.clone(), oracle.clone());

        let check = r
            .check_semantic(&feature, &[feature.clone(), setup.clone()])
            .await
            .unwrap();
        assert!(check.has_blocker);
        assert_eq!(check.blocking_job_ids, vec![JobId::from("J2")]);

        let j1 = store.job("J1").unwrap();
        assert!(j1.has_pheromone(PheromoneType::TaskNotReady));
        assert!(!j1.has_pheromone(PheromoneType::IsBlocked));
        assert_eq!(j1.blockers[0].text, "needs the framework");
        assert!(store.job("J2").unwrap().has_pheromone(PheromoneType::Importance));

        // The next structural check sees the persisted edge.
        let check = r.check_structural(&j1).await.unwrap();
        assert_eq!(check.unresolved_blocker_ids, vec![JobId::from("J2")]);
    }

    #[tokio::test]
    async fn test_semantic_ignores_unknown_ids() {
        let feature = Job::new("J1", "Add login page");
        let other = Job::new("J2", "Write docs");
        let store = Arc::new(MemoryStore::with_jobs([feature.clone(), other.clone()]));
        let oracle = Arc::new(ScriptedOracle::new([
            r#"{"hasBlocker": true, "blockingJobIds": ["J7"], "reason": "made up"}"#,
        ]));

        let check = resolver(store.clone(), oracle)
            .check_semantic(&feature, &[feature.clone(), other])
            .await
            .unwrap();
        assert!(!check.has_blocker);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_semantic_skips_oracle_without_candidates() {
        let feature = Job::new("J1", "Add login page");
        // J2 already waits on J1; citing it would create a cycle.
        let mut dependent = Job::new("J2", "Add logout");
        dependent
            .dependencies
            .push(Dependency::blocks("J2".into(), "J1".into()));
        let store = Arc::new(MemoryStore::with_jobs([feature.clone(), dependent.clone()]));
        let oracle = Arc::new(ScriptedOracle::default());

        let check = resolver(store, oracle.clone())
            .check_semantic(&feature, &[feature.clone(), dependent])
            .await
            .unwrap();
        assert!(!check.has_blocker);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_semantic_surfaces_malformed_oracle() {
        let feature = Job::new("J1", "a");
        let other = Job::new("J2", "b");
        let store = Arc::new(MemoryStore::with_jobs([feature.clone(), other.clone()]));
        let oracle = Arc::new(ScriptedOracle::new(["maybe?", "probably"]));

        let result = resolver(store, oracle)
            .check_semantic(&feature, &[feature.clone(), other])
            .await;
        assert!(matches!(
            result,
            Err(swarmit_core::Error::MalformedResponse { .. })
        ));
    }
}
