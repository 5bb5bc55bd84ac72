//! Read-only brokers for `ChatHistory`, `ChatPluginUsage` and `ChatToolCall`.
//!
//! These kinds have no entities of their own. Each is a view over the log
//! stream of the same name; a "resource" is the set of records written for
//! one chat, named after that chat.

use async_trait::async_trait;
use sam_db::LogRecord;
use sam_schemas::{Kind, KindFamily, Manifest, SchemaError};
use serde_json::{json, Value};

use super::manifest_from_json;
use crate::{Broker, BrokerContext, Command, SamError, SamResult, LOG_LIMIT};

fn manifest_for(kind: Kind, chat: &str) -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": kind.as_str(),
        "metadata": {
            "name": chat,
            "description": format!("{kind} records for chat {chat}"),
            "version": "1.0.0"
        },
        "spec": {
            "config": {"chat": chat}
        }
    }))
}

pub fn example_manifest(kind: Kind) -> SamResult<Manifest> {
    manifest_for(kind, "example_chat")
}

pub struct LogBroker {
    ctx: BrokerContext,
    kind: Kind,
}

impl LogBroker {
    pub fn new(ctx: BrokerContext, kind: Kind) -> SamResult<Self> {
        if kind.family() != KindFamily::ChatLog {
            return Err(SamError::internal(format!("{kind} is not a chat log kind")));
        }
        Ok(Self { ctx, kind })
    }

    async fn records(&self, name: &str, limit: usize) -> SamResult<Vec<LogRecord>> {
        let records = self
            .ctx
            .store
            .logs(self.ctx.account(), self.kind.as_str(), name, limit)
            .await?;
        if records.is_empty() {
            return Err(SamError::not_found(self.kind, name));
        }
        Ok(records)
    }

    async fn render(&self, name: &str) -> SamResult<Manifest> {
        let records = self.records(name, usize::MAX).await?;
        let mut status = serde_json::Map::new();
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            status.insert("created".into(), json!(first.created.to_rfc3339()));
            status.insert("modified".into(), json!(last.created.to_rfc3339()));
        }
        status.insert("recordCount".into(), json!(records.len()));
        Ok(manifest_for(self.kind, name)?.with_status(Value::Object(status)))
    }

    fn read_only(&self, command: Command) -> SamError {
        SamError::ReadOnly {
            kind: self.kind,
            command,
        }
    }
}

#[async_trait]
impl Broker for LogBroker {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn example_manifest(&self) -> SamResult<Manifest> {
        example_manifest(self.kind)
    }

    async fn get(&mut self, name_filter: Option<&str>) -> SamResult<Vec<Manifest>> {
        let names = self
            .ctx
            .store
            .log_names(self.ctx.account(), self.kind.as_str())
            .await?;
        let mut out = Vec::new();
        for name in names
            .iter()
            .filter(|n| name_filter.map_or(true, |f| n.contains(f)))
        {
            out.push(self.render(name).await?);
        }
        Ok(out)
    }

    async fn describe(&mut self, name: &str) -> SamResult<Manifest> {
        self.render(name).await
    }

    async fn apply(&mut self, manifest: &Manifest) -> SamResult<Manifest> {
        if manifest.kind() != self.kind {
            return Err(SchemaError::KindMismatch {
                expected: self.kind,
                found: manifest.kind(),
            }
            .into());
        }
        Err(self.read_only(Command::Apply))
    }

    async fn delete(&mut self, _name: &str) -> SamResult<()> {
        Err(self.read_only(Command::Delete))
    }

    async fn deploy(&mut self, _name: &str) -> SamResult<Manifest> {
        Err(self.read_only(Command::Deploy))
    }

    async fn undeploy(&mut self, _name: &str) -> SamResult<Manifest> {
        Err(self.read_only(Command::Undeploy))
    }

    async fn logs(&mut self, name: &str) -> SamResult<Vec<LogRecord>> {
        self.records(name, LOG_LIMIT).await
    }
}
