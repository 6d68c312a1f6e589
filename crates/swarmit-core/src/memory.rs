//! In-process job store.
//!
//! Implements both store contracts over a mutex-guarded job list. Used for
//! local dry runs and as the reference store in tests; it mirrors the
//! observable behavior expected of the remote store (atomic locks, stamped
//! deposits, idempotent dependency edges).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::blocker::{Blocker, Dependency, NewBlocker};
use crate::job::{Job, JobStatus};
use crate::pheromone::{NewPheromone, PheromoneDeposit, PheromoneType};
use crate::split::{NewSplitProposal, SplitProposal, SplitProposalStatus};
use crate::store::{JobPool, JobSort, SignalStore};
use crate::{Error, JobId, Result};

#[derive(Debug, Default)]
struct State {
    /// Insertion order doubles as creation order.
    jobs: Vec<Job>,
    locks: HashMap<JobId, String>,
    failing: HashSet<JobId>,
    writes: usize,
}

impl State {
    fn index(&self, job_id: &JobId) -> Result<usize> {
        if self.failing.contains(job_id) {
            return Err(Error::Store(format!("injected failure for job {job_id}")));
        }
        self.jobs
            .iter()
            .position(|j| j.id == *job_id)
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))
    }

    fn job_mut(&mut self, job_id: &JobId) -> Result<&mut Job> {
        let idx = self.index(job_id)?;
        self.writes += 1;
        Ok(&mut self.jobs[idx])
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let store = Self::new();
        for job in jobs {
            store.insert(job);
        }
        store
    }

    /// Insert or replace a job.
    pub fn insert(&self, job: Job) {
        let mut state = self.state.lock();
        match state.jobs.iter().position(|j| j.id == job.id) {
            Some(idx) => state.jobs[idx] = job,
            None => state.jobs.push(job),
        }
    }

    /// Current copy of a job, bypassing failure injection.
    pub fn job(&self, job_id: impl Into<JobId>) -> Option<Job> {
        let job_id = job_id.into();
        self.state.lock().jobs.iter().find(|j| j.id == job_id).cloned()
    }

    /// Make every call that touches this job fail until [`Self::heal`].
    pub fn fail_job(&self, job_id: impl Into<JobId>) {
        self.state.lock().failing.insert(job_id.into());
    }

    pub fn heal(&self, job_id: impl Into<JobId>) {
        self.state.lock().failing.remove(&job_id.into());
    }

    pub fn lock_holder(&self, job_id: impl Into<JobId>) -> Option<String> {
        self.state.lock().locks.get(&job_id.into()).cloned()
    }

    /// Number of successful mutating calls so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    fn importance(job: &Job) -> f64 {
        job.pheromones
            .iter()
            .filter(|p| p.pheromone_type == PheromoneType::Importance)
            .map(|p| p.intensity)
            .fold(0.0, f64::max)
    }
}

#[async_trait]
impl JobPool for MemoryStore {
    async fn list_open_jobs(&self, group_id: &str, sort_by: JobSort) -> Result<Vec<Job>> {
        let state = self.state.lock();
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| j.is_open() && j.group_id == group_id)
            .cloned()
            .collect();

        if sort_by == JobSort::Importance {
            // Stable: equal importance keeps creation order.
            jobs.sort_by(|a, b| Self::importance(b).total_cmp(&Self::importance(a)));
        }
        Ok(jobs)
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        let state = self.state.lock();
        match state.index(job_id) {
            Ok(idx) => Ok(Some(state.jobs[idx].clone())),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn lock_job(&self, job_id: &JobId, agent_id: &str, _agent_name: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.index(job_id)?;
        if state.locks.contains_key(job_id) {
            return Ok(false);
        }
        state.locks.insert(job_id.clone(), agent_id.to_string());
        state.writes += 1;
        Ok(true)
    }

    async fn unlock_job(&self, job_id: &JobId, agent_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.index(job_id)?;
        let holder = state.locks.get(job_id).cloned();
        match holder {
            Some(holder) if holder != agent_id => Err(Error::Conflict(format!(
                "job {job_id} is locked by {holder}"
            ))),
            Some(_) => {
                state.locks.remove(job_id);
                state.writes += 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn force_unlock_job(&self, job_id: &JobId, _requested_by: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.index(job_id)?;
        state.locks.remove(job_id);
        state.writes += 1;
        Ok(())
    }

    async fn update_job_status(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        let mut state = self.state.lock();
        state.job_mut(job_id)?.status = status;
        Ok(())
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn deposit_pheromone(&self, job_id: &JobId, pheromone: NewPheromone) -> Result<()> {
        let mut state = self.state.lock();
        state
            .job_mut(job_id)?
            .pheromones
            .push(pheromone.stamp(Utc::now()));
        Ok(())
    }

    async fn remove_pheromone(&self, job_id: &JobId, pheromone_type: PheromoneType) -> Result<()> {
        let mut state = self.state.lock();
        state
            .job_mut(job_id)?
            .pheromones
            .retain(|p| p.pheromone_type != pheromone_type);
        Ok(())
    }

    async fn get_pheromones(&self, job_id: &JobId) -> Result<Vec<PheromoneDeposit>> {
        let state = self.state.lock();
        let idx = state.index(job_id)?;
        Ok(state.jobs[idx].pheromones.clone())
    }

    async fn add_blocker(&self, job_id: &JobId, blocker: NewBlocker) -> Result<()> {
        let mut state = self.state.lock();
        state.job_mut(job_id)?.blockers.push(Blocker {
            id: format!("blk-{}", Uuid::now_v7()),
            text: blocker.text,
            added_by: blocker.added_by,
            added_by_name: blocker.added_by_name,
            blocker_job_ids: blocker.blocker_job_ids,
            resolved_by: None,
            resolved_at: None,
        });
        Ok(())
    }

    async fn remove_blocker(&self, job_id: &JobId, blocker_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state
            .job_mut(job_id)?
            .blockers
            .retain(|b| b.id != blocker_id);
        Ok(())
    }

    async fn resolve_blocker(
        &self,
        job_id: &JobId,
        blocker_id: &str,
        resolved_by: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let job = state.job_mut(job_id)?;
        let blocker = job
            .blockers
            .iter_mut()
            .find(|b| b.id == blocker_id)
            .ok_or_else(|| Error::NotFound(format!("blocker {blocker_id} on job {job_id}")))?;
        blocker.resolved_by = Some(resolved_by.to_string());
        blocker.resolved_at = Some(Utc::now());
        Ok(())
    }

    async fn add_dependency(&self, from: &JobId, to: &JobId) -> Result<()> {
        let mut state = self.state.lock();
        let edge = Dependency::blocks(from.clone(), to.clone());
        let job = state.job_mut(from)?;
        if !job.dependencies.contains(&edge) {
            job.dependencies.push(edge);
        }
        Ok(())
    }

    async fn remove_dependency(&self, from: &JobId, to: &JobId) -> Result<()> {
        let mut state = self.state.lock();
        state
            .job_mut(from)?
            .dependencies
            .retain(|d| !(d.from_job_id == *from && d.to_job_id == *to));
        Ok(())
    }

    async fn add_split_proposal(&self, job_id: &JobId, proposal: NewSplitProposal) -> Result<Job> {
        let mut state = self.state.lock();
        let job = state.job_mut(job_id)?;
        job.split_proposals.push(SplitProposal {
            id: format!("split-{}", Uuid::now_v7()),
            description: proposal.description,
            proposed_jobs: proposal.proposed_jobs,
            proposed_by: proposal.proposed_by,
            status: SplitProposalStatus::Pending,
        });
        Ok(job.clone())
    }

    /// Accepting materializes the proposed sub-jobs in the parent's group and
    /// closes the parent.
    async fn accept_split_proposal(&self, job_id: &JobId, proposal_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let job = state.job_mut(job_id)?;
        let proposal = job
            .split_proposals
            .iter_mut()
            .find(|p| p.id == proposal_id)
            .ok_or_else(|| Error::NotFound(format!("split proposal {proposal_id}")))?;
        if !proposal.is_pending() {
            return Err(Error::Conflict(format!(
                "split proposal {proposal_id} is not pending"
            )));
        }
        proposal.status = SplitProposalStatus::Accepted;
        let specs = proposal.proposed_jobs.clone();
        let group_id = job.group_id.clone();
        job.status = JobStatus::Closed;

        for spec in specs {
            let child = Job::new(JobId::generate(), spec.name)
                .with_description(spec.description)
                .in_group(group_id.clone());
            state.jobs.push(child);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentContext;
    use crate::job::JobSpec;

    fn agent() -> AgentContext {
        AgentContext::new("a1", "Ant")
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let store = MemoryStore::with_jobs([Job::new("J1", "work").in_group("g")]);
        let id = JobId::from("J1");

        assert!(store.lock_job(&id, "a1", "Ant").await.unwrap());
        assert!(!store.lock_job(&id, "a2", "Bee").await.unwrap());
        assert!(store.unlock_job(&id, "a2").await.is_err());

        store.unlock_job(&id, "a1").await.unwrap();
        assert!(store.lock_job(&id, "a2", "Bee").await.unwrap());
        store.force_unlock_job(&id, "a1").await.unwrap();
        assert_eq!(store.lock_holder("J1"), None);
    }

    #[tokio::test]
    async fn test_list_sorts_by_importance_then_creation() {
        let store = MemoryStore::with_jobs([
            Job::new("J1", "a").in_group("g"),
            Job::new("J2", "b").in_group("g"),
            Job::new("J3", "c").in_group("other"),
            Job::new("J4", "d").in_group("g"),
        ]);
        store
            .deposit_pheromone(
                &"J4".into(),
                NewPheromone::by(&agent(), PheromoneType::Importance, 0.8),
            )
            .await
            .unwrap();
        store
            .update_job_status(&"J2".into(), JobStatus::Closed)
            .await
            .unwrap();

        let jobs = store.list_open_jobs("g", JobSort::Importance).await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["J4", "J1"]);

        let jobs = store.list_open_jobs("g", JobSort::CreatedAt).await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["J1", "J4"]);
    }

    #[tokio::test]
    async fn test_injected_failure_and_missing_job() {
        let store = MemoryStore::with_jobs([Job::new("J1", "a")]);
        store.fail_job("J1");
        assert!(matches!(
            store.get_pheromones(&"J1".into()).await,
            Err(Error::Store(_))
        ));
        assert!(store.get_job(&"J1".into()).await.is_err());
        store.heal("J1");
        assert!(store.get_job(&"J1".into()).await.unwrap().is_some());
        assert!(store.get_job(&"nope".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accepting_split_materializes_children() {
        let store = MemoryStore::with_jobs([Job::new("J1", "big").in_group("g")]);
        let job = store
            .add_split_proposal(
                &"J1".into(),
                NewSplitProposal {
                    description: "two halves".to_string(),
                    proposed_jobs: vec![
                        JobSpec {
                            name: "first".to_string(),
                            description: String::new(),
                        },
                        JobSpec {
                            name: "second".to_string(),
                            description: String::new(),
                        },
                    ],
                    proposed_by: "a1".to_string(),
                },
            )
            .await
            .unwrap();
        let proposal_id = job.split_proposals[0].id.clone();

        store
            .accept_split_proposal(&"J1".into(), &proposal_id)
            .await
            .unwrap();
        assert!(
            store
                .accept_split_proposal(&"J1".into(), &proposal_id)
                .await
                .is_err()
        );

        let open = store.list_open_jobs("g", JobSort::CreatedAt).await.unwrap();
        let names: Vec<&str> = open.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_dependency_edges_are_idempotent() {
        let store = MemoryStore::with_jobs([Job::new("J1", "a"), Job::new("J2", "b")]);
        let (j1, j2) = (JobId::from("J1"), JobId::from("J2"));
        store.add_dependency(&j1, &j2).await.unwrap();
        store.add_dependency(&j1, &j2).await.unwrap();
        assert_eq!(store.job("J1").unwrap().dependencies.len(), 1);

        store.remove_dependency(&j1, &j2).await.unwrap();
        assert!(store.job("J1").unwrap().dependencies.is_empty());
    }
}
