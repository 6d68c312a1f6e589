//! Prompt text for the oracle judgments.

use swarmit_core::Job;

pub const DEPENDENCY_SYSTEM: &str = "You are the dependency analyst of a swarm of software agents \
that share a pool of jobs. You decide whether a job can start now or must wait for other open jobs. \
Be conservative: only report a blocker when the job genuinely cannot be done before the other job. \
Always answer with a single JSON object and nothing else.";

pub const SPLIT_SYSTEM: &str = "You are the planner of a swarm of software agents that share a pool \
of jobs. You decide whether a job is too large for one agent and should be broken into smaller, \
independently implementable jobs. Always answer with a single JSON object and nothing else.";

fn describe(job: &Job) -> String {
    if job.description.trim().is_empty() {
        format!("- id: {}\n  name: {}", job.id, job.name)
    } else {
        format!(
            "- id: {}\n  name: {}\n  description: {}",
            job.id,
            job.name,
            job.description.trim()
        )
    }
}

/// Ask whether `job` is blocked by any of `others` on semantic grounds.
pub fn dependency_prompt(job: &Job, others: &[&Job]) -> String {
    let listing = others
        .iter()
        .map(|j| describe(j))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Job under test:\n{job}\n\n\
         Other open jobs:\n{listing}\n\n\
         Decide whether the job under test must wait for any of the other open jobs. \
         Apply these rules in order:\n\
         1. Foundational or setup tasks block feature tasks built on them.\n\
         2. A task that produces a resource blocks tasks that consume that resource.\n\
         3. Schema or interface definition tasks block the implementation tasks that depend on them.\n\n\
         Only cite ids from the list of other open jobs.\n\
         Reply with JSON of the form:\n\
         {{\"hasBlocker\": true|false, \"blockingJobIds\": [\"<id>\", ...], \"reason\": \"<one sentence>\"}}",
        job = describe(job),
    )
}

/// Ask whether `job` should be split into several smaller jobs.
pub fn split_prompt(job: &Job) -> String {
    format!(
        "Job:\n{job}\n\n\
         Should this job be split into two or more smaller jobs that different agents could \
         implement independently? Do not split jobs that are already small or that only make \
         sense as one change.\n\
         Reply with JSON of the form:\n\
         {{\"splittable\": true|false, \"reason\": \"<one sentence>\", \
         \"proposedJobs\": [{{\"name\": \"<short name>\", \"description\": \"<what to do>\"}}, ...]}}",
        job = describe(job),
    )
}
