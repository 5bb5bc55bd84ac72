//! Shared fixtures and harnesses for SAM scenario tests.
//!
//! [`Harness`] wires a broker context over an in-memory store with a live
//! provisioning queue, so scenarios can drive brokers exactly as the daemon
//! does without a database or network.

mod contended;
mod corrupt;
mod pipeline;

use std::sync::Arc;

use anyhow::{Context, Result};
use sam_broker::{
    registry, Broker, BrokerContext, ChatPipeline, Kind, ProvisioningTask, RequestContext,
    TaskSubmitter,
};
use sam_db::{EntityStore, MemoryStore};
use sam_loader::ManifestLoader;
use sam_schemas::Manifest;
use tokio::sync::mpsc::UnboundedReceiver;

pub use contended::ContendedStore;
pub use corrupt::CorruptStore;
pub use pipeline::ScriptedPipeline;

pub const ACCOUNT: &str = "acme";
pub const STAFF_USER: &str = "admin";
pub const PLATFORM_DOMAIN: &str = "smarter.sh";

/// Named YAML fixtures under `fixtures/`.
pub fn fixture(name: &str) -> Result<&'static str> {
    Ok(match name {
        "user" => include_str!("../fixtures/user.yaml"),
        "secret" => include_str!("../fixtures/secret.yaml"),
        "sql_connection" => include_str!("../fixtures/sql_connection.yaml"),
        "sql_plugin" => include_str!("../fixtures/sql_plugin.yaml"),
        "chatbot" => include_str!("../fixtures/chatbot.yaml"),
        "chat" => include_str!("../fixtures/chat.yaml"),
        other => anyhow::bail!("no fixture named '{other}'"),
    })
}

/// Parse a named fixture into a validated manifest.
pub fn fixture_manifest(name: &str) -> Result<Manifest> {
    let text = fixture(name)?;
    let loaded = ManifestLoader::new()
        .load_str(text)
        .with_context(|| format!("fixture {name}"))?;
    Ok(loaded.manifest)
}

/// Fixtures in dependency order: every reference points backwards.
pub const FIXTURE_CHAIN: [&str; 6] = [
    "user",
    "secret",
    "sql_connection",
    "sql_plugin",
    "chatbot",
    "chat",
];

pub struct Harness {
    pub ctx: BrokerContext,
    pub store: Arc<dyn EntityStore>,
    tasks: Option<UnboundedReceiver<ProvisioningTask>>,
}

impl Harness {
    /// Staff caller on a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn EntityStore>) -> Self {
        let (tasks, rx) = TaskSubmitter::channel();
        let ctx = BrokerContext {
            request: RequestContext::new(ACCOUNT, STAFF_USER).staff(),
            store: store.clone(),
            tasks,
            chat: None,
            platform_domain: PLATFORM_DOMAIN.to_string(),
        };
        Self {
            ctx,
            store,
            tasks: Some(rx),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ChatPipeline>) -> Self {
        self.ctx.chat = Some(pipeline);
        self
    }

    /// Same store, different caller.
    pub fn as_user(&self, username: &str, staff: bool) -> BrokerContext {
        let mut request = RequestContext::new(ACCOUNT, username);
        if staff {
            request = request.staff();
        }
        self.ctx.with_request(request)
    }

    /// Drop the provisioning receiver; later deploys fail with `NotReady`.
    pub fn close_provisioning(&mut self) {
        self.tasks = None;
    }

    /// Tasks submitted so far, oldest first.
    pub fn drain_tasks(&mut self) -> Vec<ProvisioningTask> {
        let mut out = Vec::new();
        if let Some(rx) = self.tasks.as_mut() {
            while let Ok(task) = rx.try_recv() {
                out.push(task);
            }
        }
        out
    }

    pub fn broker(&self, kind: Kind) -> Result<Box<dyn Broker>> {
        Ok(registry::global().instantiate(kind, self.ctx.clone())?)
    }

    pub async fn apply(&self, manifest: &Manifest) -> Result<Manifest> {
        let mut broker = self.broker(manifest.kind())?;
        Ok(broker.apply(manifest).await?)
    }

    pub async fn apply_fixture(&self, name: &str) -> Result<Manifest> {
        let manifest = fixture_manifest(name)?;
        self.apply(&manifest)
            .await
            .with_context(|| format!("apply fixture {name}"))
    }

    /// Apply fixtures in order up to and including `last`.
    pub async fn seed_through(&self, last: &str) -> Result<()> {
        for name in FIXTURE_CHAIN {
            self.apply_fixture(name).await?;
            if name == last {
                return Ok(());
            }
        }
        anyhow::bail!("'{last}' is not in the fixture chain")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
