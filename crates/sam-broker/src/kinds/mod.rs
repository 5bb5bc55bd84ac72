//! One [`Resource`](crate::Resource) per persisted kind, plus the read-only
//! chat log broker.

pub mod account;
pub mod api_connection;
pub mod auth_token;
pub mod chat;
pub mod chatbot;
pub mod logs;
pub mod plugin;
pub mod secret;
pub mod sql_connection;
pub mod user;

use sam_db::{Entity, LogRecord};
use sam_loader::ManifestLoader;
use sam_schemas::{Kind, Manifest};
use serde_json::Value;

use crate::mapping::FieldMap;
use crate::{BrokerContext, SamResult};

pub use account::AccountResource;
pub use api_connection::ApiConnectionResource;
pub use auth_token::AuthTokenResource;
pub use chat::ChatResource;
pub use chatbot::ChatbotResource;
pub use logs::LogBroker;
pub use plugin::PluginResource;
pub use secret::SecretResource;
pub use sql_connection::SqlConnectionResource;
pub use user::UserResource;

/// Placeholder written over sensitive values on output.
pub const MASK: &str = "******";

/// Field map for a persisted kind; `None` for the chat log kinds.
pub fn field_map_for(kind: Kind) -> Option<&'static FieldMap> {
    Some(match kind {
        Kind::Account => account::field_map(),
        Kind::User => user::field_map(),
        Kind::Secret => secret::field_map(),
        Kind::AuthToken => auth_token::field_map(),
        Kind::ApiConnection => api_connection::field_map(),
        Kind::SqlConnection => sql_connection::field_map(),
        Kind::StaticPlugin | Kind::SqlPlugin | Kind::ApiPlugin => return plugin::field_map(kind),
        Kind::Chatbot => chatbot::field_map(),
        Kind::Chat => chat::field_map(),
        Kind::ChatHistory | Kind::ChatPluginUsage | Kind::ChatToolCall => return None,
    })
}

pub(crate) fn manifest_from_json(doc: Value) -> SamResult<Manifest> {
    Ok(ManifestLoader::new().load_value(doc)?)
}

/// Key in [`LogRecord::data`] holding the id of the entity a record belongs to.
pub(crate) const ENTITY_ID: &str = "entityId";

/// The last `limit` records of `stream` written for this entity. Records left
/// behind by a deleted entity of the same name do not match its id.
pub(crate) async fn entity_logs(
    ctx: &BrokerContext,
    stream: Kind,
    entity: &Entity,
    limit: usize,
) -> SamResult<Vec<LogRecord>> {
    let id = entity.id.to_string();
    let mut records: Vec<LogRecord> = ctx
        .store
        .logs(ctx.account(), stream.as_str(), &entity.name, usize::MAX)
        .await?
        .into_iter()
        .filter(|r| r.data.get(ENTITY_ID).and_then(Value::as_str) == Some(id.as_str()))
        .collect();
    let skip = records.len().saturating_sub(limit);
    Ok(records.split_off(skip))
}

pub(crate) fn mask(spec: &mut Value, pointer: &str) {
    if let Some(v) = spec.pointer_mut(pointer) {
        if !v.is_null() {
            *v = Value::String(MASK.to_string());
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use sam_db::MemoryStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::{BrokerContext, ProvisioningTask, RequestContext, TaskSubmitter};

    pub fn context() -> (BrokerContext, UnboundedReceiver<ProvisioningTask>) {
        let (tasks, rx) = TaskSubmitter::channel();
        let ctx = BrokerContext {
            request: RequestContext::new("acme", "admin").staff(),
            store: Arc::new(MemoryStore::new()),
            tasks,
            chat: None,
            platform_domain: "smarter.sh".into(),
        };
        (ctx, rx)
    }
}
