//! Read access to pheromone deposits.

use futures::future::join_all;
use std::sync::Arc;
use swarmit_core::{Job, JobId, PheromoneDeposit, PheromoneType, Result, SignalStore};
use tracing::warn;

use crate::monitor::TimeoutMonitor;

/// Typed read-only view over the pheromones in the job store.
#[derive(Clone)]
pub struct PheromoneClient {
    store: Arc<dyn SignalStore>,
    monitor: TimeoutMonitor,
}

impl PheromoneClient {
    pub fn new(store: Arc<dyn SignalStore>, monitor: TimeoutMonitor) -> Self {
        Self { store, monitor }
    }

    pub async fn has_pheromone(&self, job_id: &JobId, pheromone_type: PheromoneType) -> Result<bool> {
        let pheromones = self.store.get_pheromones(job_id).await?;
        Ok(swarmit_core::pheromone::carries(&pheromones, pheromone_type))
    }

    pub async fn get_job_pheromones(&self, job_id: &JobId) -> Result<Vec<PheromoneDeposit>> {
        self.store.get_pheromones(job_id).await
    }

    /// Whether the job's current blocked episode has outlived the threshold.
    pub async fn is_blocked_too_long(&self, job_id: &JobId) -> Result<bool> {
        let pheromones = self.store.get_pheromones(job_id).await?;
        Ok(self.monitor.is_blocked_too_long(&pheromones))
    }

    /// Jobs carrying none of `types`, judged from the pheromones embedded in
    /// the snapshot. Order is preserved.
    pub fn filter_excluding(jobs: &[Job], types: &[PheromoneType]) -> Vec<Job> {
        jobs.iter()
            .filter(|job| !types.iter().any(|t| job.has_pheromone(*t)))
            .cloned()
            .collect()
    }

    /// Jobs carrying `pheromone_type` according to the snapshot.
    pub fn filter_carrying(jobs: &[Job], pheromone_type: PheromoneType) -> Vec<Job> {
        jobs.iter()
            .filter(|job| job.has_pheromone(pheromone_type))
            .cloned()
            .collect()
    }

    /// Jobs carrying `pheromone_type` according to a fresh read from the
    /// store. A job whose lookup fails is left out.
    pub async fn filter_having(&self, jobs: &[Job], pheromone_type: PheromoneType) -> Vec<Job> {
        let checks = join_all(
            jobs.iter()
                .map(|job| self.has_pheromone(&job.id, pheromone_type)),
        )
        .await;

        jobs.iter()
            .zip(checks)
            .filter_map(|(job, check)| match check {
                Ok(true) => Some(job.clone()),
                Ok(false) => None,
                Err(e) => {
                    warn!(job_id = %job.id, pheromone = %pheromone_type, error = %e, "Pheromone lookup failed, skipping job");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmit_core::{AgentContext, MemoryStore, NewPheromone};
    use std::time::Duration;

    fn job_with(id: &str, types: &[PheromoneType]) -> Job {
        let agent = AgentContext::new("a1", "Ant");
        let mut job = Job::new(id, id);
        for t in types {
            job.pheromones.push(NewPheromone::by(&agent, *t, 1.0).stamp(chrono::Utc::now()));
        }
        job
    }

    #[test]
    fn test_filter_excluding_uses_snapshot_and_keeps_order() {
        let jobs = vec![
            job_with("J1", &[PheromoneType::Importance]),
            job_with("J2", &[PheromoneType::IsBlocked]),
            job_with("J3", &[]),
            job_with("J4", &[PheromoneType::SplitThisJob, PheromoneType::Importance]),
        ];

        let kept = PheromoneClient::filter_excluding(
            &jobs,
            &[PheromoneType::SplitThisJob, PheromoneType::IsBlocked],
        );
        let ids: Vec<&str> = kept.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["J1", "J3"]);
    }

    #[tokio::test]
    async fn test_filter_having_reads_store_and_skips_failures() {
        // Snapshot says nothing; the store knows better.
        let jobs = vec![job_with("J1", &[]), job_with("J2", &[]), job_with("J3", &[])];
        let store = Arc::new(MemoryStore::with_jobs(jobs.clone()));
        let agent = AgentContext::new("a2", "Bee");
        for id in ["J1", "J3"] {
            store
                .deposit_pheromone(
                    &id.into(),
                    NewPheromone::by(&agent, PheromoneType::MightBeCompleted, 0.6),
                )
                .await
                .unwrap();
        }
        store.fail_job("J3");

        let client = PheromoneClient::new(store.clone(), TimeoutMonitor::new(Duration::from_secs(60)));
        let having = client
            .filter_having(&jobs, PheromoneType::MightBeCompleted)
            .await;
        let ids: Vec<&str> = having.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["J1"]);

        assert!(client.has_pheromone(&"J1".into(), PheromoneType::MightBeCompleted).await.unwrap());
        assert!(client.has_pheromone(&"J3".into(), PheromoneType::MightBeCompleted).await.is_err());
        assert!(!client.is_blocked_too_long(&"J1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_job_pheromones_reads_fresh_deposits() {
        let store = Arc::new(MemoryStore::with_jobs([job_with("J1", &[PheromoneType::Importance])]));
        let agent = AgentContext::new("a2", "Bee");
        store
            .deposit_pheromone(&"J1".into(), NewPheromone::by(&agent, PheromoneType::IsBlocked, 0.5))
            .await
            .unwrap();

        let client = PheromoneClient::new(store.clone(), TimeoutMonitor::new(Duration::from_secs(60)));
        let pheromones = client.get_job_pheromones(&"J1".into()).await.unwrap();

        let types: Vec<PheromoneType> = pheromones.iter().map(|p| p.pheromone_type).collect();
        assert_eq!(types, vec![PheromoneType::Importance, PheromoneType::IsBlocked]);
        assert_eq!(pheromones[1].deposited_by, "a2");
        assert_eq!(pheromones[1].intensity, 0.5);

        store.fail_job("J1");
        assert!(client.get_job_pheromones(&"J1".into()).await.is_err());
    }
}
