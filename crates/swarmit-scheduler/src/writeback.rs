//! Write-back of scheduling signals to the shared store.
//!
//! Blocker records and dependency edges are two store collections describing
//! one logical edge set. Everything that touches them goes through
//! [`SignalWriter`], which keeps both in step with idempotent add/remove.
//! Each store call is retried on its own; a failed step never rolls back
//! the steps before it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use swarmit_core::blocker::NewBlocker;
use swarmit_core::policy::BLOCK_INTENSITY;
use swarmit_core::{
    AgentContext, Error, Job, JobId, NewPheromone, PheromoneType, Result, SignalStore, SwarmPolicy,
};
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SignalWriter {
    store: Arc<dyn SignalStore>,
    agent: AgentContext,
    attempts: u32,
    backoff: Duration,
    importance_intensity: f64,
}

impl SignalWriter {
    pub fn new(store: Arc<dyn SignalStore>, agent: AgentContext, policy: &SwarmPolicy) -> Self {
        Self {
            store,
            agent,
            attempts: policy.write_retries.max(1),
            backoff: policy.write_backoff(),
            importance_intensity: policy.importance_intensity,
        }
    }

    pub fn agent(&self) -> &AgentContext {
        &self.agent
    }

    pub fn store(&self) -> &Arc<dyn SignalStore> {
        &self.store
    }

    /// Run one store call, retrying with linear backoff.
    pub async fn retry<T, F, Fut>(&self, what: &str, job_id: &JobId, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    warn!(job_id = %job_id, op = what, attempt, error = %e, "Store write failed, retrying");
                    sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(job_id = %job_id, op = what, attempts = attempt, error = %e, "Store write failed");
                    return Err(e);
                }
            }
        }
    }

    pub async fn deposit(
        &self,
        job_id: &JobId,
        pheromone_type: PheromoneType,
        intensity: f64,
    ) -> Result<()> {
        let pheromone = NewPheromone::by(&self.agent, pheromone_type, intensity);
        debug!(job_id = %job_id, pheromone = %pheromone_type, intensity, "Depositing pheromone");
        self.retry("deposit_pheromone", job_id, || {
            self.store.deposit_pheromone(job_id, pheromone.clone())
        })
        .await
    }

    pub async fn remove(&self, job_id: &JobId, pheromone_type: PheromoneType) -> Result<()> {
        debug!(job_id = %job_id, pheromone = %pheromone_type, "Removing pheromone");
        self.retry("remove_pheromone", job_id, || {
            self.store.remove_pheromone(job_id, pheromone_type)
        })
        .await
    }

    /// Record that `job` waits on `blocker_ids`.
    ///
    /// Deposits `pheromone` on the job, replaces any open blocker record
    /// citing the same jobs, adds the missing dependency edges and marks
    /// every blocker job as important. All steps are attempted; the first
    /// failure is returned at the end.
    pub async fn record_block(
        &self,
        job: &Job,
        blocker_ids: &[JobId],
        reason: &str,
        pheromone: PheromoneType,
    ) -> Result<()> {
        self.record_block_replacing(job, blocker_ids, &[], reason, pheromone)
            .await
    }

    /// Like [`record_block`](Self::record_block), also retiring what
    /// `closed_ids` made stale.
    ///
    /// Open records citing only closed jobs are resolved. Records citing a
    /// mix of closed jobs and `blocker_ids` are removed, since the new record
    /// covers their open part. Edges to closed jobs are dropped.
    pub async fn record_block_replacing(
        &self,
        job: &Job,
        blocker_ids: &[JobId],
        closed_ids: &[JobId],
        reason: &str,
        pheromone: PheromoneType,
    ) -> Result<()> {
        if blocker_ids.is_empty() {
            return Err(Error::InvalidInput(format!(
                "block on job {} cites no blocker jobs",
                job.id
            )));
        }

        let mut outcome = Ok(());
        let mut keep = |result: Result<()>| {
            if outcome.is_ok() {
                outcome = result;
            }
        };

        keep(self.deposit(&job.id, pheromone, BLOCK_INTENSITY).await);

        for stale in job.blockers.iter().filter(|b| !b.is_resolved()) {
            let cited = &stale.blocker_job_ids;
            let touches_closed = cited.iter().any(|id| closed_ids.contains(id));

            if touches_closed && cited.iter().all(|id| closed_ids.contains(id)) {
                keep(
                    self.retry("resolve_blocker", &job.id, || {
                        self.store
                            .resolve_blocker(&job.id, &stale.id, &self.agent.agent_id)
                    })
                    .await,
                );
                continue;
            }

            let covered = touches_closed
                && cited
                    .iter()
                    .all(|id| closed_ids.contains(id) || blocker_ids.contains(id));
            if covered || stale.cites_exactly(blocker_ids) {
                keep(
                    self.retry("remove_blocker", &job.id, || {
                        self.store.remove_blocker(&job.id, &stale.id)
                    })
                    .await,
                );
            }
        }

        let blocker = NewBlocker::by(&self.agent, reason, blocker_ids.to_vec());
        keep(
            self.retry("add_blocker", &job.id, || {
                self.store.add_blocker(&job.id, blocker.clone())
            })
            .await,
        );

        for blocker_id in blocker_ids {
            if job.blocking_edges().any(|d| d.to_job_id == *blocker_id) {
                continue;
            }
            keep(
                self.retry("add_dependency", &job.id, || {
                    self.store.add_dependency(&job.id, blocker_id)
                })
                .await,
            );
        }

        for edge in job.blocking_edges() {
            if closed_ids.contains(&edge.to_job_id) {
                keep(
                    self.retry("remove_dependency", &job.id, || {
                        self.store.remove_dependency(&job.id, &edge.to_job_id)
                    })
                    .await,
                );
            }
        }

        for blocker_id in blocker_ids {
            keep(
                self.deposit(blocker_id, PheromoneType::Importance, self.importance_intensity)
                    .await,
            );
        }

        outcome
    }

    /// Drop edges that point at jobs which have since closed.
    ///
    /// Blocker records whose jobs all closed are marked resolved; records
    /// with a mix are rewritten to cite only the still-open jobs.
    pub async fn prune_stale(&self, job: &Job, closed_ids: &[JobId]) -> Result<()> {
        if closed_ids.is_empty() {
            return Ok(());
        }

        for blocker in job.blockers.iter().filter(|b| !b.is_resolved()) {
            let still_open: Vec<JobId> = blocker
                .blocker_job_ids
                .iter()
                .filter(|id| !closed_ids.contains(id))
                .cloned()
                .collect();

            if still_open.len() == blocker.blocker_job_ids.len() {
                continue;
            }

            if still_open.is_empty() {
                self.retry("resolve_blocker", &job.id, || {
                    self.store
                        .resolve_blocker(&job.id, &blocker.id, &self.agent.agent_id)
                })
                .await?;
            } else {
                // No partial update exists; replace the record.
                self.retry("remove_blocker", &job.id, || {
                    self.store.remove_blocker(&job.id, &blocker.id)
                })
                .await?;
                let narrowed = NewBlocker::by(&self.agent, blocker.text.clone(), still_open);
                self.retry("add_blocker", &job.id, || {
                    self.store.add_blocker(&job.id, narrowed.clone())
                })
                .await?;
            }
        }

        for edge in job.blocking_edges() {
            if closed_ids.contains(&edge.to_job_id) {
                self.retry("remove_dependency", &job.id, || {
                    self.store.remove_dependency(&job.id, &edge.to_job_id)
                })
                .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmit_core::blocker::Dependency;
    use swarmit_core::{JobPool, JobStatus, MemoryStore};

    fn policy() -> SwarmPolicy {
        SwarmPolicy {
            write_backoff_ms: 0,
            ..SwarmPolicy::default()
        }
    }

    fn writer(store: Arc<MemoryStore>) -> SignalWriter {
        SignalWriter::new(store, AgentContext::new("a1", "Ant"), &policy())
    }

    #[tokio::test]
    async fn test_record_block_writes_the_whole_edge_set() {
        let store = Arc::new(MemoryStore::with_jobs([
            Job::new("J1", "feature"),
            Job::new("J2", "setup"),
            Job::new("J3", "schema"),
        ]));
        let w = writer(store.clone());
        let job = store.job("J1").unwrap();

        w.record_block(
            &job,
            &["J2".into(), "J3".into()],
            "needs setup and schema",
            PheromoneType::TaskNotReady,
        )
        .await
        .unwrap();

        let j1 = store.job("J1").unwrap();
        assert!(j1.has_pheromone(PheromoneType::TaskNotReady));
        assert_eq!(j1.blockers.len(), 1);
        assert_eq!(j1.blockers[0].text, "needs setup and schema");
        assert_eq!(j1.blockers[0].added_by, "a1");
        assert_eq!(
            j1.dependencies,
            vec![
                Dependency::blocks("J1".into(), "J2".into()),
                Dependency::blocks("J1".into(), "J3".into()),
            ]
        );
        assert!(store.job("J2").unwrap().has_pheromone(PheromoneType::Importance));
        assert_eq!(store.job("J3").unwrap().pheromones[0].intensity, 0.8);
    }

    #[tokio::test]
    async fn test_record_block_replaces_matching_blocker() {
        let store = Arc::new(MemoryStore::with_jobs([Job::new("J1", "a"), Job::new("J2", "b")]));
        let w = writer(store.clone());

        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J2".into()], "first", PheromoneType::IsBlocked)
            .await
            .unwrap();
        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J2".into()], "second", PheromoneType::IsBlocked)
            .await
            .unwrap();

        let j1 = store.job("J1").unwrap();
        assert_eq!(j1.blockers.len(), 1);
        assert_eq!(j1.blockers[0].text, "second");
        assert_eq!(j1.dependencies.len(), 1);
    }

    #[tokio::test]
    async fn test_record_block_replacing_retires_partly_closed_records() {
        let store = Arc::new(MemoryStore::with_jobs([
            Job::new("J1", "a"),
            Job::new("J2", "b"),
            Job::new("J3", "c"),
            Job::new("J4", "d"),
        ]));
        let w = writer(store.clone());

        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J2".into(), "J3".into()], "J2 and J3", PheromoneType::IsBlocked)
            .await
            .unwrap();
        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J4".into()], "J4", PheromoneType::IsBlocked)
            .await
            .unwrap();
        store
            .update_job_status(&"J3".into(), JobStatus::Closed)
            .await
            .unwrap();
        store
            .update_job_status(&"J4".into(), JobStatus::Closed)
            .await
            .unwrap();

        let job = store.job("J1").unwrap();
        w.record_block_replacing(
            &job,
            &["J2".into()],
            &["J3".into(), "J4".into()],
            "Waiting on open jobs: J2",
            PheromoneType::IsBlocked,
        )
        .await
        .unwrap();

        let j1 = store.job("J1").unwrap();
        let open: Vec<_> = j1.blockers.iter().filter(|b| !b.is_resolved()).collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].blocker_job_ids, vec![JobId::from("J2")]);
        let resolved: Vec<_> = j1.blockers.iter().filter(|b| b.is_resolved()).collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].blocker_job_ids, vec![JobId::from("J4")]);
        assert_eq!(j1.dependencies, vec![Dependency::blocks("J1".into(), "J2".into())]);
        assert_eq!(j1.recorded_blocker_ids(), vec![JobId::from("J2")]);
    }

    #[tokio::test]
    async fn test_record_block_continues_past_failures() {
        let store = Arc::new(MemoryStore::with_jobs([Job::new("J1", "a"), Job::new("J2", "b")]));
        store.fail_job("J2");
        let w = writer(store.clone());

        let job = store.job("J1").unwrap();
        let result = w
            .record_block(&job, &["J2".into()], "waiting", PheromoneType::IsBlocked)
            .await;

        assert!(result.is_err());
        let j1 = store.job("J1").unwrap();
        assert!(j1.has_pheromone(PheromoneType::IsBlocked));
        assert_eq!(j1.blockers.len(), 1);
        assert_eq!(j1.dependencies.len(), 1);
    }

    #[tokio::test]
    async fn test_record_block_requires_blockers() {
        let store = Arc::new(MemoryStore::with_jobs([Job::new("J1", "a")]));
        let job = store.job("J1").unwrap();
        let result = writer(store.clone())
            .record_block(&job, &[], "nothing", PheromoneType::IsBlocked)
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_prune_stale_resolves_and_narrows() {
        let store = Arc::new(MemoryStore::with_jobs([
            Job::new("J1", "a"),
            Job::new("J2", "b"),
            Job::new("J3", "c"),
            Job::new("J4", "d"),
        ]));
        let w = writer(store.clone());

        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J2".into()], "only J2", PheromoneType::IsBlocked)
            .await
            .unwrap();
        let job = store.job("J1").unwrap();
        w.record_block(&job, &["J3".into(), "J4".into()], "J3 and J4", PheromoneType::IsBlocked)
            .await
            .unwrap();

        let job = store.job("J1").unwrap();
        w.prune_stale(&job, &["J2".into(), "J3".into()]).await.unwrap();

        let j1 = store.job("J1").unwrap();
        let resolved: Vec<_> = j1.blockers.iter().filter(|b| b.is_resolved()).collect();
        let open: Vec<_> = j1.blockers.iter().filter(|b| !b.is_resolved()).collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].blocker_job_ids, vec![JobId::from("J2")]);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].blocker_job_ids, vec![JobId::from("J4")]);
        assert_eq!(open[0].text, "J3 and J4");
        assert_eq!(j1.recorded_blocker_ids(), vec![JobId::from("J4")]);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let store = Arc::new(MemoryStore::with_jobs([Job::new("J1", "a")]));
        store.fail_job("J1");
        let w = writer(store.clone());
        let id = JobId::from("J1");

        let mut calls = 0;
        let result: Result<()> = w
            .retry("probe", &id, || {
                calls += 1;
                store.remove_pheromone(&id, PheromoneType::IsBlocked)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
