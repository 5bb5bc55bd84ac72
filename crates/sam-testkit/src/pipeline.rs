use std::sync::Mutex;

use async_trait::async_trait;
use sam_broker::{ChatOutcome, ChatPipeline, ChatRequest};
use serde_json::Value;

/// Fake LLM pipeline: answers every prompt the same way and remembers what
/// it was asked.
#[derive(Default)]
pub struct ScriptedPipeline {
    response: String,
    tool_calls: Vec<Value>,
    fail: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedPipeline {
    pub fn answering(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    /// Every call fails, as a provider outage would.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_tool_call(mut self, call: Value) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatPipeline for ScriptedPipeline {
    async fn complete(&self, request: ChatRequest) -> anyhow::Result<ChatOutcome> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if self.fail {
            anyhow::bail!("provider {} is unavailable", request.provider);
        }
        Ok(ChatOutcome {
            response: self.response.clone(),
            plugins_used: request.plugins,
            tool_calls: self.tool_calls.clone(),
        })
    }
}
