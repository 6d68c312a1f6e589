//! Agent loop: list, pick, act, repeat.

use std::sync::Arc;
use std::time::Duration;
use swarmit_core::{AgentContext, Job, JobPool, JobSort, JobStatus, PickAction};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::handler::JobHandler;
use crate::picker::JobPicker;

/// Back-off multiplier applied to the poll interval after a failed listing.
const LIST_FAILURE_BACKOFF: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub cycles: u64,
    pub completed: u64,
    pub splits: u64,
    pub freed: u64,
    /// Whether the picker ran out of work, as opposed to hitting the cycle bound.
    pub terminated: bool,
}

/// One agent process working a group's jobs.
pub struct Worker {
    agent: AgentContext,
    group_id: String,
    pool: Arc<dyn JobPool>,
    picker: JobPicker,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
    max_cycles: Option<u64>,
}

impl Worker {
    pub fn new(
        agent: AgentContext,
        group_id: impl Into<String>,
        pool: Arc<dyn JobPool>,
        picker: JobPicker,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            agent,
            group_id: group_id.into(),
            pool,
            picker,
            handler,
            poll_interval: Duration::from_secs(5),
            max_cycles: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Run the worker loop until the picker terminates or the cycle bound is hit.
    pub async fn run(&self) -> WorkerSummary {
        info!(agent_id = %self.agent.agent_id, group_id = %self.group_id, "Starting worker");
        let mut summary = WorkerSummary::default();

        while self.max_cycles.is_none_or(|max| summary.cycles < max) {
            summary.cycles += 1;

            let candidates = match self
                .pool
                .list_open_jobs(&self.group_id, JobSort::Importance)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(error = %e, "Failed to list open jobs");
                    sleep(self.poll_interval * LIST_FAILURE_BACKOFF).await;
                    continue;
                }
            };

            let result = self.picker.pick(&candidates).await;
            match (result.action, result.job) {
                (Some(PickAction::Terminate), _) => {
                    summary.terminated = true;
                    break;
                }
                (Some(PickAction::Implement), Some(job)) => {
                    if self.implement(&job).await {
                        summary.completed += 1;
                    } else {
                        // The picker cannot see locks; the same head job comes back next cycle.
                        sleep(self.poll_interval).await;
                    }
                }
                (Some(PickAction::Split), Some(job)) => {
                    if self.split(&job).await {
                        summary.splits += 1;
                    } else {
                        sleep(self.poll_interval).await;
                    }
                }
                (Some(PickAction::FreeRequest), Some(job)) => {
                    if self.free(&job).await {
                        summary.freed += 1;
                    }
                    // The job stays stuck until its holder lets go.
                    sleep(self.poll_interval).await;
                }
                _ => {
                    debug!("Nothing to do this cycle");
                    sleep(self.poll_interval).await;
                }
            }
        }

        info!(
            agent_id = %self.agent.agent_id,
            cycles = summary.cycles,
            completed = summary.completed,
            terminated = summary.terminated,
            "Worker stopped"
        );
        summary
    }

    async fn claim(&self, job: &Job) -> bool {
        match self
            .pool
            .lock_job(&job.id, &self.agent.agent_id, &self.agent.agent_name)
            .await
        {
            Ok(true) => {
                info!(job_id = %job.id, "Claimed job");
                true
            }
            Ok(false) => {
                debug!(job_id = %job.id, "Job already locked by another agent");
                false
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to lock job");
                false
            }
        }
    }

    async fn release(&self, job: &Job) {
        if let Err(e) = self.pool.unlock_job(&job.id, &self.agent.agent_id).await {
            warn!(job_id = %job.id, error = %e, "Failed to unlock job");
        }
    }

    async fn implement(&self, job: &Job) -> bool {
        if !self.claim(job).await {
            return false;
        }

        let done = match self.handler.implement(job).await {
            Ok(true) => match self.pool.update_job_status(&job.id, JobStatus::Closed).await {
                Ok(()) => {
                    info!(job_id = %job.id, "Job completed");
                    true
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to close job");
                    false
                }
            },
            Ok(false) => {
                info!(job_id = %job.id, "Job left open");
                false
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Job handler failed");
                false
            }
        };

        self.release(job).await;
        done
    }

    async fn split(&self, job: &Job) -> bool {
        if !self.claim(job).await {
            return false;
        }
        let outcome = self.handler.split(job).await;
        self.release(job).await;

        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Split handler failed");
                false
            }
        }
    }

    async fn free(&self, job: &Job) -> bool {
        if let Err(e) = self
            .pool
            .force_unlock_job(&job.id, &self.agent.agent_id)
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to force-unlock job");
            return false;
        }
        if let Err(e) = self.handler.free_request(job).await {
            warn!(job_id = %job.id, error = %e, "Free-request handler failed");
        }
        true
    }
}
