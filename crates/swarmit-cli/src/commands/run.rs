//! Agent loop command.

use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use swarmit_scheduler::{CommandHandler, Worker};

pub async fn run(
    config_path: &Path,
    exec: &str,
    max_cycles: Option<u64>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if exec.trim().is_empty() {
        bail!("--exec must name a command");
    }

    let agent = super::connect(config_path)?;
    let mut handler = CommandHandler::new(exec);
    if let Some(secs) = timeout_secs {
        handler = handler.with_timeout(Duration::from_secs(secs));
    }

    println!(
        "Agent {} ({}) joining group {}",
        agent.config.agent.agent_name, agent.config.agent.agent_id, agent.config.group_id
    );

    let mut worker = Worker::new(
        agent.config.agent.clone(),
        agent.config.group_id.clone(),
        agent.store,
        agent.picker,
        Arc::new(handler),
    )
    .with_poll_interval(agent.config.policy.poll_interval());
    if let Some(max) = max_cycles {
        worker = worker.with_max_cycles(max);
    }

    let summary = worker.run().await;

    println!();
    println!("Cycles:    {}", summary.cycles);
    println!("Completed: {}", summary.completed);
    println!("Splits:    {}", summary.splits);
    println!("Freed:     {}", summary.freed);
    if summary.terminated {
        println!("No work left in group {}", agent.config.group_id);
    }
    Ok(())
}
