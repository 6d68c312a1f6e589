//! Network clients for swarmit agents.
//!
//! - [`HttpJobStore`]: the shared job store over REST
//! - [`AnthropicInference`]: the oracle over the Anthropic Messages API
//! - [`WebhookNotifier`]: narration posted to a chat webhook

pub mod anthropic;
pub mod error;
pub mod http;
pub mod webhook;

pub use anthropic::AnthropicInference;
pub use error::{ClientError, ClientResult};
pub use http::HttpJobStore;
pub use webhook::WebhookNotifier;
