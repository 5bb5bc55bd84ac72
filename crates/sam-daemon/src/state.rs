//! Shared runtime state for sam-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Everything here is
//! read-only after start-up; per-request state lives in the broker.

use std::sync::Arc;

use sam_broker::{
    registry, BrokerContext, BrokerRegistry, ChatPipeline, ProvisioningTask, RequestContext,
    TaskSubmitter,
};
use sam_db::EntityStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::Authenticator;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub registry: &'static BrokerRegistry,
    pub store: Arc<dyn EntityStore>,
    pub tasks: TaskSubmitter,
    /// `None` until an LLM pipeline is wired; `chat` then answers
    /// `NotImplemented`.
    pub chat: Option<Arc<dyn ChatPipeline>>,
    pub auth: Arc<dyn Authenticator>,
    /// Parent domain for chatbot default hosts.
    pub platform_domain: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        tasks: TaskSubmitter,
        auth: Arc<dyn Authenticator>,
        platform_domain: impl Into<String>,
    ) -> Self {
        Self {
            build: BuildInfo {
                service: "sam-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            registry: registry::global(),
            store,
            tasks,
            chat: None,
            auth,
            platform_domain: platform_domain.into(),
        }
    }

    pub fn with_chat(mut self, pipeline: Arc<dyn ChatPipeline>) -> Self {
        self.chat = Some(pipeline);
        self
    }

    /// Context for one request by `caller`.
    pub fn broker_context(&self, caller: RequestContext) -> BrokerContext {
        BrokerContext {
            request: caller,
            store: Arc::clone(&self.store),
            tasks: self.tasks.clone(),
            chat: self.chat.clone(),
            platform_domain: self.platform_domain.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn the task that hands provisioning work to the external provisioner.
///
/// The provisioner runs out of process; this end only records each task so
/// operators can follow deploys in the daemon log. The task ends when every
/// [`TaskSubmitter`] is dropped.
pub fn spawn_provisioning_drain(mut rx: UnboundedReceiver<ProvisioningTask>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0usize;
        while let Some(task) = rx.recv().await {
            handled += 1;
            info!(
                task_id = %task.id,
                action = ?task.action,
                account = %task.account,
                kind = %task.kind,
                name = %task.name,
                hosts = ?task.hosts,
                "provisioning task handed off"
            );
        }
        handled
    })
}
