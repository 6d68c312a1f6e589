//! Configuration check.

use anyhow::Result;
use std::path::Path;
use swarmit_config::Variables;

pub fn validate(path: &Path) -> Result<()> {
    let config = match super::load(path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    println!("Configuration is valid");
    println!(
        "  agent:  {} ({})",
        config.agent.agent_name, config.agent.agent_id
    );
    println!("  group:  {}", config.group_id);
    println!("  store:  {}", config.store.url);
    println!("  oracle: {} at {}", config.oracle.model, config.oracle.url);
    match &config.notify {
        Some(notify) => println!("  notify: {}", notify.webhook),
        None => println!("  notify: log"),
    }
    println!(
        "  policy: split approvals {}, blocked timeout {}ms, oracle attempts {}",
        config.policy.minimum_job_split_proposal_required,
        config.policy.blocked_timeout_ms,
        config.policy.oracle_attempts
    );

    let vars = Variables::from_process_env();
    for (field, value) in [
        ("oracle api-key", Some(config.oracle.api_key.as_str())),
        ("store token", config.store.token.as_deref()),
    ] {
        let unset = value.map(|v| vars.unresolved(v)).unwrap_or_default();
        if !unset.is_empty() {
            println!("  warning: {field} references unset variables: {}", unset.join(", "));
        }
    }
    Ok(())
}
