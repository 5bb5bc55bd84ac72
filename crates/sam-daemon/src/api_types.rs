//! Request and response types for all sam-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// /api/v1/cli/... envelope
// ---------------------------------------------------------------------------

/// Uniform response body for every CLI route, success or failure.
///
/// Exactly one of `data` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub message: String,
    pub api: String,
    /// Kind the request addressed; the raw path segment when it did not
    /// resolve.
    pub thing: String,
    pub metadata: EnvelopeMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_class: String,
    pub description: String,
    pub status: u16,
    pub context: Value,
}

impl Envelope {
    pub fn ok(thing: &str, command: &str, message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            message: message.into(),
            api: sam_schemas::API_VERSION.to_string(),
            thing: thing.to_string(),
            metadata: EnvelopeMetadata {
                command: command.to_string(),
            },
        }
    }

    pub fn error(thing: &str, command: &str, error: ErrorBody) -> Self {
        Self {
            data: None,
            message: error.description.clone(),
            error: Some(error),
            api: sam_schemas::API_VERSION.to_string(),
            thing: thing.to_string(),
            metadata: EnvelopeMetadata {
                command: command.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies / query strings
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/cli/chat/chat/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}
