//! Chat sessions and the read-only chat log kinds.

use serde::{Deserialize, Serialize};

use crate::validators::validate_name;
use crate::SchemaResult;

/// A conversation session bound to one chatbot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatSpec {
    pub config: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatConfig {
    /// Name of the `Chatbot` this session talks to.
    pub chatbot: String,
}

impl ChatSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        validate_name("spec.config.chatbot", &self.config.chatbot)
    }
}

/// Shared by `ChatHistory`, `ChatPluginUsage` and `ChatToolCall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatLogSpec {
    pub config: ChatLogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatLogConfig {
    /// Name of the `Chat` the records belong to.
    pub chat: String,
}

impl ChatLogSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        validate_name("spec.config.chat", &self.config.chat)
    }
}
