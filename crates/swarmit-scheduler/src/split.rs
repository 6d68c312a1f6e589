//! Oracle-backed judgment of whether a job should be decomposed.

use serde::Deserialize;
use swarmit_core::policy::SPLIT_INTENSITY;
use swarmit_core::split::NewSplitProposal;
use swarmit_core::{Job, JobSpec, PheromoneType, Result};
use tracing::{debug, info};

use crate::oracle::JsonOracle;
use crate::prompts::{SPLIT_SYSTEM, split_prompt};
use crate::writeback::SignalWriter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitAssessment {
    pub splittable: bool,
    pub proposed_jobs: Vec<JobSpec>,
    pub reason: String,
    /// Id of the registered proposal, when one was made.
    pub proposal_id: Option<String>,
    /// Whether the proposal was accepted on the spot.
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitVerdict {
    splittable: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    proposed_jobs: Vec<JobSpec>,
}

#[derive(Clone)]
pub struct SplitAssessor {
    oracle: JsonOracle,
    writer: SignalWriter,
    auto_accept: bool,
}

impl SplitAssessor {
    pub fn new(oracle: JsonOracle, writer: SignalWriter, auto_accept: bool) -> Self {
        Self {
            oracle,
            writer,
            auto_accept,
        }
    }

    /// Ask the oracle; on a split into two or more jobs, mark the job and
    /// register the proposal, accepting it at once when policy allows.
    pub async fn assess(&self, job: &Job) -> Result<SplitAssessment> {
        let verdict: SplitVerdict = self.oracle.ask(&split_prompt(job), SPLIT_SYSTEM).await?;

        if !verdict.splittable || verdict.proposed_jobs.len() < 2 {
            debug!(job_id = %job.id, "Job is not worth splitting");
            return Ok(SplitAssessment {
                reason: verdict.reason,
                ..SplitAssessment::default()
            });
        }

        info!(job_id = %job.id, parts = verdict.proposed_jobs.len(), "Proposing job split");
        self.writer
            .deposit(&job.id, PheromoneType::SplitThisJob, SPLIT_INTENSITY)
            .await?;

        let description = if verdict.reason.is_empty() {
            format!("Split '{}' into {} jobs", job.name, verdict.proposed_jobs.len())
        } else {
            verdict.reason.clone()
        };
        let proposal = NewSplitProposal {
            description,
            proposed_jobs: verdict.proposed_jobs.clone(),
            proposed_by: self.writer.agent().agent_id.clone(),
        };
        let store = self.writer.store();
        let updated = self
            .writer
            .retry("add_split_proposal", &job.id, || {
                store.add_split_proposal(&job.id, proposal.clone())
            })
            .await?;

        let pending = updated
            .split_proposals
            .iter()
            .find(|p| p.is_pending())
            .map(|p| p.id.clone());

        let mut accepted = false;
        if self.auto_accept {
            if let Some(proposal_id) = &pending {
                self.writer
                    .retry("accept_split_proposal", &job.id, || {
                        store.accept_split_proposal(&job.id, proposal_id)
                    })
                    .await?;
                accepted = true;
                info!(job_id = %job.id, proposal_id = %proposal_id, "Split proposal accepted");
            }
        }

        Ok(SplitAssessment {
            splittable: true,
            proposed_jobs: verdict.proposed_jobs,
            reason: verdict.reason,
            proposal_id: pending,
            accepted,
        })
    }
}
