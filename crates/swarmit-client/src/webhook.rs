//! Narration posted to a chat webhook.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use swarmit_core::oracle::Notifier;
use tracing::warn;
use url::Url;

/// Posts `{"text": ...}` to a webhook. Delivery failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: Url) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_message(&self, text: &str) {
        let sent = self
            .client
            .post(self.url.clone())
            .json(&json!({ "text": text }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        if let Err(e) = sent {
            warn!(error = %e, "Failed to deliver notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({"text": "Ant picked job J1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/hook", server.uri())).unwrap();
        WebhookNotifier::new(url).send_message("Ant picked job J1").await;
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        WebhookNotifier::new(url).send_message("lost").await;
    }
}
