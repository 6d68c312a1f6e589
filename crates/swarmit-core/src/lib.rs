//! Core domain types and traits for the swarmit job swarm.
//!
//! This crate contains:
//! - Job, pheromone, blocker, dependency and split-proposal types
//! - Agent identity and the swarm policy
//! - The pick decision returned to agent loops
//! - Contracts of the remote job store, inference service and notifier
//! - An in-process store implementing those contracts

pub mod agent;
pub mod blocker;
pub mod error;
pub mod id;
pub mod job;
pub mod memory;
pub mod oracle;
pub mod pheromone;
pub mod pick;
pub mod policy;
pub mod split;
pub mod store;

pub use agent::AgentContext;
pub use error::{Error, Result};
pub use id::JobId;
pub use job::{Job, JobSpec, JobStatus};
pub use memory::MemoryStore;
pub use pheromone::{NewPheromone, PheromoneDeposit, PheromoneType};
pub use pick::{PickAction, PickResult};
pub use policy::SwarmPolicy;
pub use store::{JobPool, JobSort, SignalStore};
