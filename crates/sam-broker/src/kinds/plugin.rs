//! `StaticPlugin`, `SqlPlugin` and `ApiPlugin`.
//!
//! The three kinds share one resource type parameterised by kind. Chatbots
//! refer to plugins by bare name without saying which plugin kind, so a name
//! may be used by at most one plugin kind per account.

use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::Entity;
use sam_schemas::{Kind, KindFamily, Manifest};
use serde_json::{json, Map, Value};

use super::manifest_from_json;
use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{BrokerContext, Resource, SamError, SamResult};

const COMMON: &[FieldMapping] = &[
    FieldMapping::new("/selector/directive", "selector_directive"),
    FieldMapping::new("/selector/searchTerms", "search_terms"),
    FieldMapping::new("/prompt/provider", "prompt_provider"),
    FieldMapping::new("/prompt/systemRole", "prompt_system_role"),
    FieldMapping::new("/prompt/model", "prompt_model"),
    FieldMapping::new("/prompt/temperature", "prompt_temperature"),
    FieldMapping::new("/prompt/maxTokens", "prompt_max_tokens"),
    FieldMapping::new("/data/description", "data_description"),
];

const STATIC_FIELDS: &[FieldMapping] = &[FieldMapping::new("/data/staticData", "static_data")];

const SQL_FIELDS: &[FieldMapping] = &[
    FieldMapping::reference(
        "/data/sqlData/connection",
        "sql_connection_id",
        RefTarget::Kind(Kind::SqlConnection),
    ),
    FieldMapping::new("/data/sqlData/sqlQuery", "sql_query"),
    FieldMapping::new("/data/sqlData/parameters", "parameters"),
    FieldMapping::new("/data/sqlData/testValues", "test_values"),
    FieldMapping::new("/data/sqlData/limit", "result_limit"),
];

const API_FIELDS: &[FieldMapping] = &[
    FieldMapping::reference(
        "/data/apiData/connection",
        "api_connection_id",
        RefTarget::Kind(Kind::ApiConnection),
    ),
    FieldMapping::new("/data/apiData/endpoint", "endpoint"),
    FieldMapping::new("/data/apiData/method", "method"),
    FieldMapping::new("/data/apiData/urlParams", "url_params"),
    FieldMapping::new("/data/apiData/headers", "headers"),
    FieldMapping::new("/data/apiData/body", "body"),
    FieldMapping::new("/data/apiData/parameters", "parameters"),
    FieldMapping::new("/data/apiData/testValues", "test_values"),
    FieldMapping::new("/data/apiData/limit", "result_limit"),
];

fn build(kind: Kind, specific: &[FieldMapping]) -> FieldMap {
    FieldMap::new(kind, COMMON.iter().chain(specific).copied().collect())
}

/// Field map for one plugin kind; `None` for every other kind.
pub fn field_map(kind: Kind) -> Option<&'static FieldMap> {
    static STATIC: OnceLock<FieldMap> = OnceLock::new();
    static SQL: OnceLock<FieldMap> = OnceLock::new();
    static API: OnceLock<FieldMap> = OnceLock::new();
    match kind {
        Kind::StaticPlugin => Some(STATIC.get_or_init(|| build(kind, STATIC_FIELDS))),
        Kind::SqlPlugin => Some(SQL.get_or_init(|| build(kind, SQL_FIELDS))),
        Kind::ApiPlugin => Some(API.get_or_init(|| build(kind, API_FIELDS))),
        _ => None,
    }
}

fn prompt() -> Value {
    json!({
        "provider": "openai",
        "systemRole": "You are a helpful assistant. Answer from the data provided.",
        "model": "gpt-4o-mini",
        "temperature": 0.5,
        "maxTokens": 256
    })
}

pub fn example_manifest(kind: Kind) -> SamResult<Manifest> {
    let (name, description, selector, data) = match kind {
        Kind::StaticPlugin => (
            "example_static_plugin",
            "Answers questions about company office hours",
            json!({"directive": "searchTerms", "searchTerms": ["hours", "open", "closed"]}),
            json!({
                "description": "Office hours by weekday",
                "staticData": {
                    "weekdays": "09:00-17:00",
                    "saturday": "10:00-14:00",
                    "sunday": "closed"
                }
            }),
        ),
        Kind::SqlPlugin => (
            "example_sql_plugin",
            "Looks up customer orders",
            json!({"directive": "searchTerms", "searchTerms": ["order", "shipment"]}),
            json!({
                "description": "Recent orders for a customer",
                "sqlData": {
                    "connection": "example_sql_connection",
                    "sqlQuery": "SELECT id, status, total FROM orders WHERE customer = '{customer}' ORDER BY created DESC",
                    "parameters": [{
                        "name": "customer",
                        "type": "string",
                        "description": "customer username",
                        "required": true
                    }],
                    "testValues": [{"name": "customer", "value": "example_user"}],
                    "limit": 10
                }
            }),
        ),
        Kind::ApiPlugin => (
            "example_api_plugin",
            "Current weather for a city",
            json!({"directive": "always"}),
            json!({
                "description": "Weather service current conditions",
                "apiData": {
                    "connection": "example_api_connection",
                    "endpoint": "/current/{city}",
                    "method": "GET",
                    "urlParams": [{"key": "units", "value": "metric"}],
                    "headers": [{"key": "Accept", "value": "application/json"}],
                    "parameters": [{"name": "city", "type": "string", "required": true}],
                    "testValues": [{"name": "city", "value": "Lisbon"}],
                    "limit": 1
                }
            }),
        ),
        other => {
            return Err(SamError::internal(format!("{other} is not a plugin kind")));
        }
    };
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": kind.as_str(),
        "metadata": {
            "name": name,
            "description": description,
            "version": "1.0.0",
            "tags": ["example"]
        },
        "spec": {
            "selector": selector,
            "prompt": prompt(),
            "data": data
        }
    }))
}

#[derive(Debug, Clone, Copy)]
pub struct PluginResource {
    kind: Kind,
    map: &'static FieldMap,
}

impl PluginResource {
    pub fn new(kind: Kind) -> SamResult<Self> {
        if kind.family() != KindFamily::Plugin {
            return Err(SamError::internal(format!("{kind} is not a plugin kind")));
        }
        let map = field_map(kind)
            .ok_or_else(|| SamError::internal(format!("{kind} has no plugin field map")))?;
        Ok(Self { kind, map })
    }

    fn data_source(&self) -> &'static str {
        match self.kind {
            Kind::SqlPlugin => "sqlData",
            Kind::ApiPlugin => "apiData",
            _ => "staticData",
        }
    }
}

#[async_trait]
impl Resource for PluginResource {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn field_map(&self) -> &'static FieldMap {
        self.map
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest(self.kind)
    }

    async fn check_apply(
        &self,
        ctx: &BrokerContext,
        manifest: &Manifest,
        _existing: Option<&Entity>,
    ) -> SamResult<()> {
        for other in RefTarget::Plugin.candidates() {
            if other == self.kind {
                continue;
            }
            if ctx
                .store
                .fetch(ctx.account(), other.as_str(), manifest.name())
                .await?
                .is_some()
            {
                return Err(SamError::business_rule(format!(
                    "plugin name '{}' is already used by {other} '{}'",
                    manifest.name(),
                    manifest.name()
                )));
            }
        }
        Ok(())
    }

    async fn status(&self, _ctx: &BrokerContext, entity: &Entity) -> SamResult<Map<String, Value>> {
        let parameters = entity
            .field("parameters")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let mut status = Map::new();
        status.insert("dataSource".into(), json!(self.data_source()));
        status.insert("parameterCount".into(), json!(parameters));
        Ok(status)
    }
}
