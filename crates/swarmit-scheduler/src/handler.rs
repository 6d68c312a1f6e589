//! What an agent does with a job once it holds the lock.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use swarmit_core::{Error, Job, Result};
use tokio::process::Command;
use tracing::{info, warn};

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Do the work. `Ok(true)` means the job is finished and may be closed.
    async fn implement(&self, job: &Job) -> Result<bool>;

    /// Called for a job whose split proposal was just registered.
    async fn split(&self, _job: &Job) -> Result<()> {
        Ok(())
    }

    /// Called after a stuck job was forcibly unlocked.
    async fn free_request(&self, _job: &Job) -> Result<()> {
        Ok(())
    }
}

/// Runs a shell command per job. The job is exposed through
/// `SWARMIT_JOB_ID`, `SWARMIT_JOB_NAME` and `SWARMIT_JOB_DESCRIPTION`.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    command: String,
    timeout: Option<Duration>,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    async fn implement(&self, job: &Job) -> Result<bool> {
        info!(job_id = %job.id, command = %self.command, "Running job command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("SWARMIT_JOB_ID", job.id.as_str())
            .env("SWARMIT_JOB_NAME", &job.name)
            .env("SWARMIT_JOB_DESCRIPTION", &job.description)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Internal(format!("failed to spawn `{}`: {e}", self.command)))?;

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait())
                .await
                .map_err(|_| {
                    Error::Timeout(format!("job {} command exceeded {:?}", job.id, limit))
                })?,
            None => child.wait().await,
        }
        .map_err(|e| Error::Internal(format!("failed to wait for `{}`: {e}", self.command)))?;

        if status.success() {
            info!(job_id = %job.id, "Job command succeeded");
        } else {
            warn!(job_id = %job.id, code = ?status.code(), "Job command failed");
        }
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("J1", "Add login page").with_description("Form posting to /login")
    }

    #[tokio::test]
    async fn test_exit_code_decides_completion() {
        assert!(CommandHandler::new("true").implement(&job()).await.unwrap());
        assert!(!CommandHandler::new("exit 3").implement(&job()).await.unwrap());
    }

    #[tokio::test]
    async fn test_job_is_exposed_through_env() {
        let handler = CommandHandler::new(
            r#"test "$SWARMIT_JOB_ID" = J1 && test "$SWARMIT_JOB_NAME" = "Add login page" && test -n "$SWARMIT_JOB_DESCRIPTION""#,
        );
        assert!(handler.implement(&job()).await.unwrap());
    }

    #[tokio::test]
    async fn test_timeout_kills_the_command() {
        let handler = CommandHandler::new("sleep 5").with_timeout(Duration::from_millis(50));
        let result = handler.implement(&job()).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
