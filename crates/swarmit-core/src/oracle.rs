//! Language-model inference and human-visible narration.

use async_trait::async_trait;

use crate::Result;

/// A language model used as an oracle for judgments over task text.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Run one completion and return the raw model text.
    async fn infer(&self, prompt: &str, system_instruction: &str) -> Result<String>;
}

/// Fire-and-forget progress channel. Implementations swallow their own errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str);
}

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_message(&self, _text: &str) {}
}
