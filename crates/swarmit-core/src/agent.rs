//! Agent identity.

use serde::{Deserialize, Serialize};

/// Identity of the agent process, used to attribute every write it makes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl AgentContext {
    pub fn new(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }
}
