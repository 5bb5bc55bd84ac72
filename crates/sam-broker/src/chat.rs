//! Seam to the LLM chat pipeline.
//!
//! The pipeline itself (prompt assembly, plugin selection, provider calls)
//! lives outside this crate. The `Chat` broker hands it a [`ChatRequest`]
//! and records what comes back as `ChatHistory`, `ChatPluginUsage` and
//! `ChatToolCall` log records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub account: String,
    pub username: String,
    pub chat: String,
    pub chatbot: String,
    pub provider: String,
    pub model: String,
    pub system_role: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Names of plugins attached to the chatbot.
    pub plugins: Vec<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    pub response: String,
    /// Plugins the pipeline selected for this prompt.
    #[serde(default)]
    pub plugins_used: Vec<String>,
    /// Raw tool-call records as reported by the provider.
    #[serde(default)]
    pub tool_calls: Vec<Value>,
}

#[async_trait]
pub trait ChatPipeline: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> anyhow::Result<ChatOutcome>;
}
