//! Test doubles shared by the scheduler tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use swarmit_core::oracle::{InferenceService, Notifier};
use swarmit_core::{Error, Result};

/// Inference service answering from a queue of canned replies.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error_front(&self, message: &str) {
        self.replies
            .lock()
            .push_front(Err(Error::Oracle(message.to_string())));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl InferenceService for ScriptedOracle {
    async fn infer(&self, prompt: &str, _system_instruction: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Oracle("no scripted reply left".to_string())))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) {
        self.messages.lock().push(text.to_string());
    }
}

pub const NOT_SPLITTABLE: &str = r#"{"splittable": false, "reason": "small enough", "proposedJobs": []}"#;
pub const NOT_BLOCKED: &str = r#"{"hasBlocker": false, "blockingJobIds": [], "reason": "independent"}"#;
