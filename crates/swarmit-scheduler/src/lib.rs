//! Job selection for swarmit agents.
//!
//! Decides which open job an agent takes next and keeps the shared
//! pheromone and blocker state up to date while doing so.
//! Runs the agent loop that acts on each decision.

pub mod dependency;
pub mod handler;
pub mod monitor;
pub mod notify;
pub mod oracle;
pub mod pheromone;
pub mod picker;
pub mod prompts;
pub mod split;
pub mod worker;
pub mod writeback;

#[cfg(test)]
pub(crate) mod testing;

pub use dependency::{DependencyResolver, SemanticCheck, StructuralCheck};
pub use handler::{CommandHandler, JobHandler};
pub use monitor::TimeoutMonitor;
pub use notify::TracingNotifier;
pub use oracle::JsonOracle;
pub use pheromone::PheromoneClient;
pub use picker::{JobPicker, Stage};
pub use split::{SplitAssessment, SplitAssessor};
pub use worker::{Worker, WorkerSummary};
pub use writeback::SignalWriter;
