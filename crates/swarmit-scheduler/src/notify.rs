//! Notifier that narrates through the log.

use async_trait::async_trait;
use swarmit_core::oracle::Notifier;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_message(&self, text: &str) {
        info!(target: "swarmit::narration", "{}", text);
    }
}
