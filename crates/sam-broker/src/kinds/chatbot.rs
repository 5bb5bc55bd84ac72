use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::{Entity, LogRecord};
use sam_schemas::{Kind, Manifest};
use serde_json::{json, Map, Value};

use super::{entity_logs, manifest_from_json};
use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{Activation, BrokerContext, Resource, SamResult, LOG_LIMIT};

/// Unmapped column holding the deployment flag. It survives re-apply.
pub const DEPLOYED: &str = "deployed";

const FIELDS: &[FieldMapping] = &[
    FieldMapping::new("/config/provider", "provider"),
    FieldMapping::new("/config/defaultModel", "default_model"),
    FieldMapping::new("/config/defaultSystemRole", "default_system_role"),
    FieldMapping::new("/config/defaultTemperature", "default_temperature"),
    FieldMapping::new("/config/defaultMaxTokens", "default_max_tokens"),
    FieldMapping::new("/config/appName", "app_name"),
    FieldMapping::new("/config/appAssistant", "app_assistant"),
    FieldMapping::new("/config/appWelcomeMessage", "app_welcome_message"),
    FieldMapping::new("/config/appExamplePrompts", "app_example_prompts"),
    FieldMapping::new("/config/appPlaceholder", "app_placeholder"),
    FieldMapping::new("/config/appInfoUrl", "app_info_url"),
    FieldMapping::new("/config/subdomain", "subdomain"),
    FieldMapping::new("/config/customDomain", "custom_domain"),
    FieldMapping::reference("/plugins", "plugin_ids", RefTarget::Plugin),
    FieldMapping::new("/functions", "functions"),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::Chatbot, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "Chatbot",
        "metadata": {
            "name": "example_chatbot",
            "description": "Customer support assistant",
            "version": "1.0.0",
            "tags": ["support"]
        },
        "spec": {
            "config": {
                "provider": "openai",
                "defaultModel": "gpt-4o-mini",
                "defaultSystemRole": "You are a friendly customer support agent.",
                "defaultTemperature": 0.5,
                "defaultMaxTokens": 512,
                "appName": "Support",
                "appAssistant": "Sam",
                "appWelcomeMessage": "Hi! How can I help?",
                "appExamplePrompts": ["Where is my order?", "What are your office hours?"],
                "appPlaceholder": "Ask me anything",
                "appInfoUrl": "https://example.com/support",
                "subdomain": "support"
            },
            "plugins": ["example_static_plugin"],
            "functions": ["get_current_weather"]
        }
    }))
}

/// Lower-case, `[a-z0-9-]` only, no leading/trailing `-`.
fn dns_label(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}

/// `<subdomain or name>.<account>.<platform domain>`
pub fn default_host(ctx: &BrokerContext, entity: &Entity) -> String {
    let label = entity.field_str("subdomain").unwrap_or(&entity.name);
    format!(
        "{}.{}.{}",
        dns_label(label),
        dns_label(&entity.account),
        ctx.platform_domain
    )
}

pub struct ChatbotResource;

#[async_trait]
impl Resource for ChatbotResource {
    fn kind(&self) -> Kind {
        Kind::Chatbot
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    fn activation(&self) -> Option<Activation> {
        Some(Activation {
            column: DEPLOYED,
            provision: true,
        })
    }

    fn supports_logs(&self) -> bool {
        true
    }

    fn hosts(&self, ctx: &BrokerContext, entity: &Entity) -> Vec<String> {
        let mut hosts = vec![default_host(ctx, entity)];
        if let Some(custom) = entity.field_str("custom_domain") {
            hosts.push(custom.to_ascii_lowercase());
        }
        hosts
    }

    async fn status(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<Map<String, Value>> {
        let host = default_host(ctx, entity);
        let url_host = entity.field_str("custom_domain").unwrap_or(&host);
        let plugins = entity
            .field("plugin_ids")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let mut status = Map::new();
        status.insert(
            "deployed".into(),
            json!(entity.field_bool(DEPLOYED).unwrap_or(false)),
        );
        status.insert("defaultHost".into(), json!(host));
        status.insert("url".into(), json!(format!("https://{url_host}/")));
        status.insert("pluginCount".into(), json!(plugins));
        Ok(status)
    }

    async fn logs(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<Vec<LogRecord>> {
        entity_logs(ctx, Kind::Chatbot, entity, LOG_LIMIT).await
    }
}
