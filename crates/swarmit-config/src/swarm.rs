//! Agent configuration parsing.

use crate::{ConfigError, ConfigResult, Variables};
use kdl::{KdlDocument, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::Path;
use swarmit_core::{AgentContext, SwarmPolicy};
use url::Url;

const DEFAULT_ORACLE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ORACLE_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Everything an agent process needs to join a swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub agent: AgentContext,
    /// Group whose open jobs form this agent's work queue.
    pub group_id: String,
    pub store: StoreConfig,
    pub oracle: OracleConfig,
    pub notify: Option<NotifyConfig>,
    pub policy: SwarmPolicy,
}

/// Remote job store endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: Url,
    pub token: Option<String>,
}

/// Language-model endpoint used for dependency and split judgments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub url: Url,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook: Url,
}

/// Read and parse a configuration file, interpolating from the process environment.
pub fn load_swarm_config(path: impl AsRef<Path>) -> ConfigResult<SwarmConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_swarm_config(&content, &Variables::from_process_env())
}

/// Parse an agent configuration from KDL text.
pub fn parse_swarm_config(kdl: &str, vars: &Variables) -> ConfigResult<SwarmConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut agent = None;
    let mut group_id = None;
    let mut store = None;
    let mut oracle = None;
    let mut notify = None;
    let mut policy = SwarmPolicy::default();

    for node in doc.nodes() {
        match node.name().value() {
            "agent" => set_once(&mut agent, "agent", parse_agent(node, vars)?)?,
            "group" => {
                let id = get_first_string_arg(node, vars)
                    .ok_or_else(|| ConfigError::MissingField("group id".to_string()))?;
                set_once(&mut group_id, "group", id)?;
            }
            "store" => set_once(&mut store, "store", parse_store(node, vars)?)?,
            "oracle" => set_once(&mut oracle, "oracle", parse_oracle(node, vars)?)?,
            "notify" => set_once(&mut notify, "notify", parse_notify(node, vars)?)?,
            "policy" => parse_policy(node, &mut policy)?,
            _ => {} // Ignore unknown nodes
        }
    }

    let config = SwarmConfig {
        agent: agent.ok_or_else(|| ConfigError::MissingField("agent".to_string()))?,
        group_id: group_id.ok_or_else(|| ConfigError::MissingField("group".to_string()))?,
        store: store.ok_or_else(|| ConfigError::MissingField("store".to_string()))?,
        oracle: oracle.ok_or_else(|| ConfigError::MissingField("oracle".to_string()))?,
        notify,
        policy,
    };
    validate_policy(&config.policy)?;
    Ok(config)
}

fn set_once<T>(slot: &mut Option<T>, name: &str, value: T) -> ConfigResult<()> {
    if slot.is_some() {
        return Err(ConfigError::Duplicate(name.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_agent(node: &KdlNode, vars: &Variables) -> ConfigResult<AgentContext> {
    let agent_id = get_first_string_arg(node, vars)
        .ok_or_else(|| ConfigError::MissingField("agent id".to_string()))?;
    let agent_name = get_string_prop(node, "name", vars).unwrap_or_else(|| agent_id.clone());

    let mut agent = AgentContext::new(agent_id, agent_name);
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "capabilities" => agent.capabilities = get_all_string_args(child, vars),
                "requirements" => agent.requirements = get_all_string_args(child, vars),
                _ => {}
            }
        }
    }
    Ok(agent)
}

fn parse_store(node: &KdlNode, vars: &Variables) -> ConfigResult<StoreConfig> {
    let url = get_string_prop(node, "url", vars)
        .ok_or_else(|| ConfigError::MissingField("store url".to_string()))?;
    Ok(StoreConfig {
        url: parse_url("store url", &url)?,
        token: get_string_prop(node, "token", vars),
    })
}

fn parse_oracle(node: &KdlNode, vars: &Variables) -> ConfigResult<OracleConfig> {
    let api_key = get_string_prop(node, "api-key", vars)
        .ok_or_else(|| ConfigError::MissingField("oracle api-key".to_string()))?;
    let url = get_string_prop(node, "url", vars).unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string());
    let max_tokens = match node.get("max-tokens") {
        Some(value) => integer_value("oracle max-tokens", value)?,
        None => DEFAULT_MAX_TOKENS,
    };

    Ok(OracleConfig {
        url: parse_url("oracle url", &url)?,
        model: get_string_prop(node, "model", vars)
            .unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string()),
        api_key,
        max_tokens,
    })
}

fn parse_notify(node: &KdlNode, vars: &Variables) -> ConfigResult<NotifyConfig> {
    let webhook = get_string_prop(node, "webhook", vars)
        .ok_or_else(|| ConfigError::MissingField("notify webhook".to_string()))?;
    Ok(NotifyConfig {
        webhook: parse_url("notify webhook", &webhook)?,
    })
}

fn parse_policy(node: &KdlNode, policy: &mut SwarmPolicy) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let key = child.name().value();
        let Some(value) = get_first_arg(child) else {
            return Err(ConfigError::MissingField(format!("policy {key}")));
        };
        let field = format!("policy {key}");

        match key {
            "minimum-job-split-proposal-required" => {
                policy.minimum_job_split_proposal_required = integer_value(&field, value)?
            }
            "blocked-timeout-ms" => policy.blocked_timeout_ms = integer_value(&field, value)?,
            "importance-intensity" => policy.importance_intensity = float_value(&field, value)?,
            "reinforce-intensity" => policy.reinforce_intensity = float_value(&field, value)?,
            "oracle-attempts" => policy.oracle_attempts = integer_value(&field, value)?,
            "write-retries" => policy.write_retries = integer_value(&field, value)?,
            "write-backoff-ms" => policy.write_backoff_ms = integer_value(&field, value)?,
            "poll-interval-ms" => policy.poll_interval_ms = integer_value(&field, value)?,
            _ => {}
        }
    }
    Ok(())
}

fn validate_policy(policy: &SwarmPolicy) -> ConfigResult<()> {
    let invalid = |field: &str, message: &str| ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    };

    if policy.minimum_job_split_proposal_required == 0 {
        return Err(invalid(
            "policy minimum-job-split-proposal-required",
            "must be at least 1",
        ));
    }
    for (field, intensity) in [
        ("policy importance-intensity", policy.importance_intensity),
        ("policy reinforce-intensity", policy.reinforce_intensity),
    ] {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(invalid(field, "must be between 0 and 1"));
        }
    }
    if policy.oracle_attempts == 0 {
        return Err(invalid("policy oracle-attempts", "must be at least 1"));
    }
    if policy.write_retries == 0 {
        return Err(invalid("policy write-retries", "must be at least 1"));
    }
    Ok(())
}

fn parse_url(field: &str, raw: &str) -> ConfigResult<Url> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("{raw}: {e}"),
    })
}

fn integer_value<T: TryFrom<i128>>(field: &str, value: &KdlValue) -> ConfigResult<T> {
    value
        .as_integer()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a non-negative integer, got {value}"),
        })
}

fn float_value(field: &str, value: &KdlValue) -> ConfigResult<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|n| n as f64))
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a number, got {value}"),
        })
}

// Helper functions for extracting values from KDL nodes

fn get_first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_string_arg(node: &KdlNode, vars: &Variables) -> Option<String> {
    get_first_arg(node)
        .and_then(|v| v.as_string())
        .map(|s| vars.interpolate(s))
}

fn get_all_string_args(node: &KdlNode, vars: &Variables) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| vars.interpolate(s))
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str, vars: &Variables) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| vars.interpolate(s))
}
