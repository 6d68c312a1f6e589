//! One pick cycle, printed as JSON.

use anyhow::{Context, Result};
use std::path::Path;
use swarmit_core::{JobPool, JobSort};

pub async fn pick(config_path: &Path) -> Result<()> {
    let agent = super::connect(config_path)?;

    let candidates = agent
        .store
        .list_open_jobs(&agent.config.group_id, JobSort::Importance)
        .await
        .with_context(|| format!("Failed to list open jobs of group {}", agent.config.group_id))?;

    let result = agent.picker.pick(&candidates).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
