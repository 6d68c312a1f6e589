//! The job picker: a waterfall of selection stages.
//!
//! Each call looks at one snapshot of open jobs (importance-sorted by the
//! store) and walks the stages in order, stopping at the first one that has
//! a job to look at:
//!
//! 1. normal pool: jobs with no split/blocked/not-ready marks
//! 2. recheck: not-ready jobs someone flagged as possibly unblocked
//! 3. unclassified: everything else that is not split or not-ready
//! 4. last resort: not-ready jobs, escalated when stuck too long
//! 5. exhausted: nothing left, the agent should stop
//!
//! At most one job is examined per call, which bounds the oracle to two
//! calls per cycle. The picker keeps no state between calls.

use std::fmt;
use std::sync::Arc;
use swarmit_core::oracle::{InferenceService, Notifier};
use swarmit_core::{
    AgentContext, Job, JobPool, PheromoneType, PickAction, PickResult, Result, SignalStore,
    SwarmPolicy,
};
use tracing::{debug, info, warn};

use crate::dependency::{DependencyResolver, StructuralCheck};
use crate::monitor::TimeoutMonitor;
use crate::oracle::JsonOracle;
use crate::pheromone::PheromoneClient;
use crate::split::SplitAssessor;
use crate::writeback::SignalWriter;

/// Marks that keep a job out of the normal pool.
const NOT_NORMAL: [PheromoneType; 3] = [
    PheromoneType::SplitThisJob,
    PheromoneType::IsBlocked,
    PheromoneType::TaskNotReady,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normal,
    Recheck,
    Unclassified,
    LastResort,
    Exhausted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Recheck => write!(f, "recheck"),
            Self::Unclassified => write!(f, "unclassified"),
            Self::LastResort => write!(f, "last-resort"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

pub struct JobPicker {
    pheromones: PheromoneClient,
    resolver: DependencyResolver,
    splitter: SplitAssessor,
    writer: SignalWriter,
    notifier: Arc<dyn Notifier>,
    reinforce_intensity: f64,
}

impl JobPicker {
    pub fn new(
        agent: AgentContext,
        policy: &SwarmPolicy,
        pool: Arc<dyn JobPool>,
        signals: Arc<dyn SignalStore>,
        inference: Arc<dyn InferenceService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let writer = SignalWriter::new(signals.clone(), agent, policy);
        let oracle = JsonOracle::new(inference, policy.oracle_attempts);
        let monitor = TimeoutMonitor::new(policy.blocked_timeout());

        Self {
            pheromones: PheromoneClient::new(signals, monitor),
            resolver: DependencyResolver::new(pool, oracle.clone(), writer.clone()),
            splitter: SplitAssessor::new(oracle, writer.clone(), policy.auto_accepts_splits()),
            writer,
            notifier,
            reinforce_intensity: policy.reinforce_intensity,
        }
    }

    /// Decide what this agent should do with the given snapshot.
    ///
    /// Store and oracle failures never escape: the job being examined is
    /// skipped and `{None, None}` is returned for this cycle.
    pub async fn pick(&self, candidates: &[Job]) -> PickResult {
        if candidates.is_empty() {
            return self.exhausted().await;
        }

        let normal = PheromoneClient::filter_excluding(candidates, &NOT_NORMAL);
        if let Some(job) = normal.first() {
            let outcome = self.take_normal(job, candidates).await;
            return self.settle(Stage::Normal, job, outcome).await;
        }

        let blocked = PheromoneClient::filter_carrying(candidates, PheromoneType::TaskNotReady);
        let rechecks = self
            .pheromones
            .filter_having(&blocked, PheromoneType::MightBeCompleted)
            .await;
        if let Some(job) = rechecks.first() {
            let outcome = self.take_recheck(job).await;
            return self.settle(Stage::Recheck, job, outcome).await;
        }

        let rest: Vec<&Job> = candidates
            .iter()
            .filter(|job| !job.has_pheromone(PheromoneType::SplitThisJob))
            .filter(|job| !blocked.iter().any(|b| b.id == job.id))
            .collect();
        if let Some(job) = rest.first() {
            let outcome = self.take_unclassified(job).await;
            return self.settle(Stage::Unclassified, job, outcome).await;
        }

        if let Some(job) = blocked.first() {
            let outcome = self.take_last_resort(job).await;
            return self.settle(Stage::LastResort, job, outcome).await;
        }

        self.exhausted().await
    }

    async fn take_normal(&self, job: &Job, candidates: &[Job]) -> Result<PickResult> {
        let structural = self.resolver.check_structural(job).await?;
        if !structural.resolved {
            self.block(job, &structural).await?;
            return Ok(PickResult::nothing());
        }
        self.prune(job, &structural).await;

        let semantic = self.resolver.check_semantic(job, candidates).await?;
        if semantic.has_blocker {
            self.narrate(format!(
                "{} found job {} not ready: {}",
                self.agent().agent_name,
                job.id,
                semantic.reason
            ))
            .await;
            return Ok(PickResult::nothing());
        }

        self.split_or_implement(job).await
    }

    async fn take_recheck(&self, job: &Job) -> Result<PickResult> {
        let structural = self.resolver.check_structural(job).await?;
        if !structural.resolved {
            debug!(job_id = %job.id, "Possibly-completed blockers are still open");
            return Ok(PickResult::nothing());
        }

        self.writer.remove(&job.id, PheromoneType::IsBlocked).await?;
        self.writer
            .remove(&job.id, PheromoneType::MightBeCompleted)
            .await?;
        self.prune(job, &structural).await;
        Ok(PickResult::implement(job.clone()))
    }

    async fn take_unclassified(&self, job: &Job) -> Result<PickResult> {
        let structural = self.resolver.check_structural(job).await?;
        if !structural.resolved {
            self.block(job, &structural).await?;
            return Ok(PickResult::nothing());
        }
        self.prune(job, &structural).await;

        self.split_or_implement(job).await
    }

    async fn take_last_resort(&self, job: &Job) -> Result<PickResult> {
        let structural = self.resolver.check_structural(job).await?;
        if structural.resolved {
            self.writer.remove(&job.id, PheromoneType::IsBlocked).await?;
            self.prune(job, &structural).await;
            return Ok(PickResult::implement(job.clone()));
        }

        if self.pheromones.is_blocked_too_long(&job.id).await? {
            return Ok(PickResult::free_request(job.clone()));
        }

        self.writer
            .deposit(&job.id, PheromoneType::IsBlocked, self.reinforce_intensity)
            .await?;
        Ok(PickResult::nothing())
    }

    async fn split_or_implement(&self, job: &Job) -> Result<PickResult> {
        let assessment = self.splitter.assess(job).await?;
        if assessment.splittable {
            Ok(PickResult::split(job.clone()))
        } else {
            Ok(PickResult::implement(job.clone()))
        }
    }

    async fn block(&self, job: &Job, structural: &StructuralCheck) -> Result<()> {
        self.resolver.record_structural_block(job, structural).await?;
        let ids: Vec<&str> = structural
            .unresolved_blocker_ids
            .iter()
            .map(|id| id.as_str())
            .collect();
        self.narrate(format!(
            "{} marked job {} blocked by {}",
            self.agent().agent_name,
            job.id,
            ids.join(", ")
        ))
        .await;
        Ok(())
    }

    /// Best-effort cleanup of edges to closed jobs.
    async fn prune(&self, job: &Job, structural: &StructuralCheck) {
        if let Err(e) = self
            .writer
            .prune_stale(job, &structural.closed_blocker_ids)
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to prune stale blockers");
        }
    }

    async fn exhausted(&self) -> PickResult {
        info!(stage = %Stage::Exhausted, "No candidate jobs left");
        self.narrate(format!(
            "{} found no work left and is shutting down",
            self.agent().agent_name
        ))
        .await;
        PickResult::terminate()
    }

    async fn settle(&self, stage: Stage, job: &Job, outcome: Result<PickResult>) -> PickResult {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(stage = %stage, job_id = %job.id, error = %e, "Skipping job this cycle");
                return PickResult::nothing();
            }
        };

        let agent = &self.agent().agent_name;
        match result.action {
            Some(PickAction::Implement) => {
                info!(stage = %stage, job_id = %job.id, "Picked job to implement");
                self.narrate(format!("{agent} picked job {} ({})", job.id, job.name))
                    .await;
            }
            Some(PickAction::Split) => {
                info!(stage = %stage, job_id = %job.id, "Picked job to split");
                self.narrate(format!("{agent} proposed splitting job {} ({})", job.id, job.name))
                    .await;
            }
            Some(PickAction::FreeRequest) => {
                info!(stage = %stage, job_id = %job.id, "Job blocked too long, requesting release");
                self.narrate(format!(
                    "{agent} requests job {} be freed: blocked too long",
                    job.id
                ))
                .await;
            }
            Some(PickAction::Terminate) | None => {
                debug!(stage = %stage, job_id = %job.id, "Job processed, nothing selected");
            }
        }
        result
    }

    fn agent(&self) -> &AgentContext {
        self.writer.agent()
    }

    async fn narrate(&self, text: String) {
        self.notifier.send_message(&text).await;
    }
}
