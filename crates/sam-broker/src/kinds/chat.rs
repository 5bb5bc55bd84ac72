//! `Chat`: a conversation session bound to one deployed chatbot.
//!
//! Each prompt goes through the configured [`ChatPipeline`](crate::ChatPipeline);
//! the exchange is recorded on the `ChatHistory`, `ChatPluginUsage` and
//! `ChatToolCall` log streams under the chat's name.

use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::{Entity, LogRecord};
use sam_schemas::{Kind, Manifest};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{chatbot, entity_logs, manifest_from_json, ENTITY_ID};
use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{BrokerContext, ChatRequest, Command, Resource, SamError, SamResult, LOG_LIMIT};

const FIELDS: &[FieldMapping] = &[FieldMapping::reference(
    "/config/chatbot",
    "chatbot_id",
    RefTarget::Kind(Kind::Chatbot),
)];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::Chat, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "Chat",
        "metadata": {
            "name": "example_chat",
            "description": "Support session",
            "version": "1.0.0"
        },
        "spec": {
            "config": {"chatbot": "example_chatbot"}
        }
    }))
}

pub struct ChatResource;

impl ChatResource {
    async fn entity_by_id(ctx: &BrokerContext, id: Option<&str>) -> SamResult<Option<Entity>> {
        let Some(id) = id else { return Ok(None) };
        let id = Uuid::parse_str(id).map_err(|e| {
            SamError::internal_from("uuid::Error", format!("stored reference '{id}' is not an id: {e}"))
        })?;
        Ok(ctx.store.fetch_by_id(ctx.account(), id).await?)
    }
}

#[async_trait]
impl Resource for ChatResource {
    fn kind(&self) -> Kind {
        Kind::Chat
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    fn supports_chat(&self) -> bool {
        true
    }

    fn supports_logs(&self) -> bool {
        true
    }

    async fn status(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<Map<String, Value>> {
        let history = entity_logs(ctx, Kind::ChatHistory, entity, usize::MAX).await?;
        let mut status = Map::new();
        status.insert("messageCount".into(), json!(history.len()));
        if let Some(last) = history.last() {
            status.insert("lastMessage".into(), json!(last.created.to_rfc3339()));
        }
        Ok(status)
    }

    async fn chat(&self, ctx: &BrokerContext, entity: &Entity, prompt: &str) -> SamResult<Value> {
        let pipeline = ctx.chat.clone().ok_or(SamError::NotImplemented {
            kind: Kind::Chat,
            command: Command::Chat,
        })?;
        if prompt.trim().is_empty() {
            return Err(SamError::validation("prompt: must not be empty"));
        }

        let bot = Self::entity_by_id(ctx, entity.field_str("chatbot_id"))
            .await?
            .ok_or_else(|| {
                SamError::internal(format!("chat '{}' has a dangling chatbot reference", entity.name))
            })?;
        if !bot.field_bool(chatbot::DEPLOYED).unwrap_or(false) {
            return Err(SamError::NotReady(format!(
                "Chatbot '{}' is not deployed",
                bot.name
            )));
        }

        let mut plugins = Vec::new();
        for id in bot
            .field("plugin_ids")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(p) = Self::entity_by_id(ctx, id.as_str()).await? {
                plugins.push(p.name);
            }
        }

        let request = ChatRequest {
            account: ctx.account().to_string(),
            username: ctx.request.username.clone(),
            chat: entity.name.clone(),
            chatbot: bot.name.clone(),
            provider: bot.field_str("provider").unwrap_or_default().to_string(),
            model: bot.field_str("default_model").unwrap_or_default().to_string(),
            system_role: bot
                .field_str("default_system_role")
                .unwrap_or_default()
                .to_string(),
            temperature: bot
                .field("default_temperature")
                .and_then(Value::as_f64)
                .unwrap_or_default(),
            max_tokens: bot
                .field("default_max_tokens")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or_default(),
            plugins,
            prompt: prompt.to_string(),
        };
        let outcome = pipeline
            .complete(request)
            .await
            .map_err(|e| {
                SamError::internal_from("ChatPipelineError", format!("chat pipeline failed: {e:#}"))
            })?;

        let account = ctx.account();
        ctx.store
            .append_log(LogRecord::new(
                account,
                Kind::ChatHistory.as_str(),
                &entity.name,
                &outcome.response,
                json!({
                    (ENTITY_ID): entity.id.to_string(),
                    "user": ctx.request.username,
                    "chatbot": bot.name,
                    "prompt": prompt,
                }),
            ))
            .await?;
        for plugin in &outcome.plugins_used {
            ctx.store
                .append_log(LogRecord::new(
                    account,
                    Kind::ChatPluginUsage.as_str(),
                    &entity.name,
                    plugin,
                    json!({"chatbot": bot.name, "prompt": prompt}),
                ))
                .await?;
        }
        for call in &outcome.tool_calls {
            let name = call.get("name").and_then(Value::as_str).unwrap_or("tool_call");
            ctx.store
                .append_log(LogRecord::new(
                    account,
                    Kind::ChatToolCall.as_str(),
                    &entity.name,
                    name,
                    call.clone(),
                ))
                .await?;
        }
        tracing::info!(
            chat = %entity.name,
            chatbot = %bot.name,
            account,
            plugins = outcome.plugins_used.len(),
            tool_calls = outcome.tool_calls.len(),
            "chat completed"
        );

        Ok(json!({
            "chat": entity.name,
            "chatbot": bot.name,
            "response": outcome.response,
            "pluginsUsed": outcome.plugins_used,
            "toolCalls": outcome.tool_calls.len(),
        }))
    }

    async fn logs(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<Vec<LogRecord>> {
        entity_logs(ctx, Kind::ChatHistory, entity, LOG_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::kinds::{plugin, testing::context, ChatbotResource, PluginResource};
    use crate::{Broker, ChatOutcome, ChatPipeline, ProvisioningTask, ResourceBroker};

    struct Echo;

    #[async_trait]
    impl ChatPipeline for Echo {
        async fn complete(&self, request: ChatRequest) -> anyhow::Result<ChatOutcome> {
            Ok(ChatOutcome {
                response: format!("echo: {}", request.prompt),
                plugins_used: request.plugins.clone(),
                tool_calls: vec![json!({"name": "get_current_weather", "arguments": {"city": "Lisbon"}})],
            })
        }
    }

    async fn seeded(deploy: bool) -> (BrokerContext, UnboundedReceiver<ProvisioningTask>) {
        let (mut ctx, rx) = context();
        ctx.chat = Some(Arc::new(Echo));
        ResourceBroker::new(ctx.clone(), PluginResource::new(Kind::StaticPlugin).unwrap())
            .apply(&plugin::example_manifest(Kind::StaticPlugin).unwrap())
            .await
            .unwrap();
        let mut bots = ResourceBroker::new(ctx.clone(), ChatbotResource);
        bots.apply(&chatbot::example_manifest().unwrap()).await.unwrap();
        if deploy {
            bots.deploy("example_chatbot").await.unwrap();
        }
        ResourceBroker::new(ctx.clone(), ChatResource)
            .apply(&example_manifest().unwrap())
            .await
            .unwrap();
        (ctx, rx)
    }

    #[tokio::test]
    async fn chat_records_history_plugin_usage_and_tool_calls() {
        let (ctx, _rx) = seeded(true).await;
        let mut chats = ResourceBroker::new(ctx.clone(), ChatResource);
        let reply = chats.chat("example_chat", "what are your hours?").await.unwrap();
        assert_eq!(reply["response"], json!("echo: what are your hours?"));
        assert_eq!(reply["pluginsUsed"], json!(["example_static_plugin"]));

        let history = chats.logs("example_chat").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].data["prompt"], json!("what are your hours?"));

        let usage = ctx
            .store
            .logs("acme", "ChatPluginUsage", "example_chat", 10)
            .await
            .unwrap();
        assert_eq!(usage[0].message, "example_static_plugin");
        let calls = ctx
            .store
            .logs("acme", "ChatToolCall", "example_chat", 10)
            .await
            .unwrap();
        assert_eq!(calls[0].message, "get_current_weather");

        let described = chats.describe("example_chat").await.unwrap();
        assert_eq!(described.status().unwrap()["messageCount"], json!(1));
    }

    #[tokio::test]
    async fn undeployed_chatbot_is_not_ready() {
        let (ctx, _rx) = seeded(false).await;
        let mut chats = ResourceBroker::new(ctx, ChatResource);
        let err = chats.chat("example_chat", "hello").await.unwrap_err();
        assert_eq!(err.class(), "NotReady");
    }

    #[tokio::test]
    async fn missing_pipeline_is_not_implemented() {
        let (mut ctx, _rx) = seeded(true).await;
        ctx.chat = None;
        let mut chats = ResourceBroker::new(ctx, ChatResource);
        let err = chats.chat("example_chat", "hello").await.unwrap_err();
        assert_eq!(err.class(), "NotImplemented");
    }
}
