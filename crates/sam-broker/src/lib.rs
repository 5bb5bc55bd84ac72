//! Brokers: the per-kind implementations of the SAM command verbs.
//!
//! A request resolves a [`Kind`] through the [`registry`], instantiates a
//! fresh [`Broker`] for it with a [`BrokerContext`], runs exactly one verb
//! and drops the broker. Brokers reach persisted state only through
//! [`sam_db::EntityStore`], provisioning only through [`TaskSubmitter`], and
//! the LLM only through [`ChatPipeline`].
//!
//! The manifest <-> entity transformation is table driven: every kind
//! declares a [`mapping::FieldMap`] from nested camelCase spec pointers to
//! flat snake_case entity columns.

mod broker;
pub mod chat;
mod context;
mod error;
pub mod kinds;
pub mod mapping;
pub mod registry;
mod tasks;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use broker::{Activation, Broker, Resource, ResourceBroker, LOG_LIMIT};
pub use chat::{ChatOutcome, ChatPipeline, ChatRequest};
pub use context::{BrokerContext, RequestContext};
pub use error::{SamError, SamResult};
pub use registry::BrokerRegistry;
pub use sam_schemas::Kind;
pub use tasks::{ProvisioningAction, ProvisioningTask, TaskReceipt, TaskSubmitter};

/// The verbs a broker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Apply,
    Chat,
    Delete,
    Deploy,
    Describe,
    ExampleManifest,
    Get,
    Logs,
    Undeploy,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Apply,
        Command::Chat,
        Command::Delete,
        Command::Deploy,
        Command::Describe,
        Command::ExampleManifest,
        Command::Get,
        Command::Logs,
        Command::Undeploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Apply => "apply",
            Command::Chat => "chat",
            Command::Delete => "delete",
            Command::Deploy => "deploy",
            Command::Describe => "describe",
            Command::ExampleManifest => "example_manifest",
            Command::Get => "get",
            Command::Logs => "logs",
            Command::Undeploy => "undeploy",
        }
    }

    /// Whether the verb addresses a single named resource.
    pub fn requires_name(&self) -> bool {
        matches!(
            self,
            Command::Chat
                | Command::Delete
                | Command::Deploy
                | Command::Describe
                | Command::Logs
                | Command::Undeploy
        )
    }

    /// Lower-case lookup; `manifest` is accepted for `example_manifest`.
    pub fn parse(s: &str) -> Option<Command> {
        let s = s.trim().to_ascii_lowercase();
        if s == "manifest" {
            return Some(Command::ExampleManifest);
        }
        Command::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = SamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s).ok_or_else(|| {
            SamError::validation(format!(
                "unknown command '{s}'; expected one of: {}",
                Command::ALL.map(|c| c.as_str()).join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parse_accepts_alias() {
        assert_eq!(Command::parse("manifest"), Some(Command::ExampleManifest));
        assert_eq!(Command::parse("example_manifest"), Some(Command::ExampleManifest));
        assert_eq!(Command::parse("Describe"), Some(Command::Describe));
        assert_eq!(Command::parse("frobnicate"), None);
    }

    #[test]
    fn unknown_command_error_lists_the_table() {
        let err = "frobnicate".parse::<Command>().unwrap_err();
        assert!(err.to_string().contains("undeploy"), "{err}");
    }
}
