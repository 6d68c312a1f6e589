//! CLI command implementations.

pub mod pick;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use swarmit_client::{AnthropicInference, HttpJobStore, WebhookNotifier};
use swarmit_config::{SwarmConfig, load_swarm_config};
use swarmit_core::oracle::Notifier;
use swarmit_scheduler::{JobPicker, TracingNotifier};
use tracing::info;

/// Clients and picker built from one configuration.
pub struct Agent {
    pub config: SwarmConfig,
    pub store: Arc<HttpJobStore>,
    pub picker: JobPicker,
}

pub fn load(path: &Path) -> Result<SwarmConfig> {
    load_swarm_config(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

pub fn connect(path: &Path) -> Result<Agent> {
    let config = load(path)?;
    info!(
        config = %path.display(),
        agent_id = %config.agent.agent_id,
        group_id = %config.group_id,
        "Loaded configuration"
    );

    let store = Arc::new(HttpJobStore::new(&config.store.url, config.store.token.clone()));
    let inference = Arc::new(AnthropicInference::new(
        &config.oracle.url,
        config.oracle.api_key.clone(),
        config.oracle.model.clone(),
        config.oracle.max_tokens,
    ));
    let notifier: Arc<dyn Notifier> = match &config.notify {
        Some(notify) => Arc::new(WebhookNotifier::new(notify.webhook.clone())),
        None => Arc::new(TracingNotifier),
    };

    let picker = JobPicker::new(
        config.agent.clone(),
        &config.policy,
        store.clone(),
        store.clone(),
        inference,
        notifier,
    );

    Ok(Agent {
        config,
        store,
        picker,
    })
}
