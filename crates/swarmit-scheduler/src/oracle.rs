//! Structured answers from the inference service.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use swarmit_core::oracle::InferenceService;
use swarmit_core::{Error, Result};
use tracing::{debug, warn};

// A fenced ```json block anywhere in the reply.
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid")
});

/// Pull the JSON object out of a model reply that may wrap it in prose or
/// a Markdown code fence.
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON.captures(raw) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Wraps an [`InferenceService`] and re-prompts until the reply parses as `T`.
#[derive(Clone)]
pub struct JsonOracle {
    inference: Arc<dyn InferenceService>,
    attempts: u32,
}

impl JsonOracle {
    pub fn new(inference: Arc<dyn InferenceService>, attempts: u32) -> Self {
        Self {
            inference,
            attempts: attempts.max(1),
        }
    }

    pub async fn ask<T: DeserializeOwned>(&self, prompt: &str, system: &str) -> Result<T> {
        let mut current = prompt.to_string();
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            let raw = match self.inference.infer(&current, system).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(attempt, error = %e, "Inference call failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            let parsed = extract_json(&raw)
                .ok_or_else(|| "reply contains no JSON object".to_string())
                .and_then(|json| serde_json::from_str::<T>(json).map_err(|e| e.to_string()));

            match parsed {
                Ok(value) => {
                    debug!(attempt, "Oracle answered");
                    return Ok(value);
                }
                Err(message) => {
                    warn!(attempt, error = %message, "Oracle reply did not match the schema");
                    current = format!(
                        "{prompt}\n\nYour previous reply could not be used ({message}). \
                         Reply with a single JSON object matching the requested schema and nothing else."
                    );
                    last_error = message;
                }
            }
        }

        Err(Error::MalformedResponse {
            attempts: self.attempts,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"ok": true}"#), Some(r#"{"ok": true}"#));
        assert_eq!(
            extract_json("Sure! Here you go:\n```json\n{\"ok\": false}\n```\nAnything else?"),
            Some("{\"ok\": false}")
        );
        assert_eq!(
            extract_json("The answer is {\"ok\": true, \"n\": {\"x\": 1}} as requested."),
            Some("{\"ok\": true, \"n\": {\"x\": 1}}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_retries_until_valid() {
        let inference = Arc::new(ScriptedOracle::new([
            "I think it is fine.",
            r#"{"ok": "yes"}"#,
            r#"{"ok": true}"#,
        ]));
        let oracle = JsonOracle::new(inference.clone(), 3);

        let verdict: Verdict = oracle.ask("Is it ok?", "Be strict.").await.unwrap();
        assert_eq!(verdict, Verdict { ok: true });

        let prompts = inference.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0], "Is it ok?");
        assert!(prompts[1].starts_with("Is it ok?"));
        assert!(prompts[1].contains("could not be used"));
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let inference = Arc::new(ScriptedOracle::new(["nope", "still nope", "{\"ok\": true}"]));
        let oracle = JsonOracle::new(inference.clone(), 2);

        let result: Result<Verdict> = oracle.ask("Is it ok?", "").await;
        assert!(matches!(result, Err(Error::MalformedResponse { attempts: 2, .. })));
        assert_eq!(inference.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_count_as_attempts() {
        let inference = Arc::new(ScriptedOracle::new([r#"{"ok": false}"#]));
        inference.push_error_front("connection reset");
        let oracle = JsonOracle::new(inference.clone(), 2);

        let verdict: Verdict = oracle.ask("Is it ok?", "").await.unwrap();
        assert_eq!(verdict, Verdict { ok: false });
    }
}
