//! KDL configuration parsing for swarmit agents.
//!
//! This crate handles parsing of:
//! - The agent configuration file (swarm.kdl)
//! - Variable interpolation in configuration values

pub mod error;
pub mod swarm;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use swarm::{
    NotifyConfig, OracleConfig, StoreConfig, SwarmConfig, load_swarm_config, parse_swarm_config,
};
pub use variables::Variables;
