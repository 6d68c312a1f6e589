//! Inference over the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use swarmit_core::Result;
use swarmit_core::oracle::InferenceService;
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// Current Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [ApiMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

pub struct AnthropicInference {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicInference {
    pub fn new(base: &Url, api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/v1/messages", base.as_str().trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }

    async fn complete(&self, prompt: &str, system: &str) -> std::result::Result<String, ClientError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages: [ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending inference request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(e) => format!("{}: {}", e.error.error_type, e.error.message),
                Err(_) if status == StatusCode::UNAUTHORIZED => "invalid API key".to_string(),
                Err(_) => body,
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let text: String = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        Ok(text)
    }
}

#[async_trait]
impl InferenceService for AnthropicInference {
    async fn infer(&self, prompt: &str, system_instruction: &str) -> Result<String> {
        self.complete(prompt, system_instruction)
            .await
            .map_err(ClientError::into_oracle_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarmit_core::Error;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn inference(server: &MockServer) -> AnthropicInference {
        let base = Url::parse(&server.uri()).unwrap();
        AnthropicInference::new(&base, "test-key", "claude-sonnet-4-5", 256)
    }

    #[tokio::test]
    async fn test_infer_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-5",
                "max_tokens": 256,
                "system": "be brief",
                "messages": [{"role": "user", "content": "split?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "model": "claude-sonnet-4-5",
                "content": [
                    {"type": "text", "text": "{\"splittable\": "},
                    {"type": "text", "text": "false}"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = inference(&server).infer("split?", "be brief").await.unwrap();
        assert_eq!(text, "{\"splittable\": false}");
    }

    #[tokio::test]
    async fn test_api_errors_become_oracle_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let err = inference(&server).infer("hi", "").await.unwrap_err();
        match err {
            Error::Oracle(message) => assert!(message.contains("overloaded_error")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
