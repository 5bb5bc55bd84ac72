use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::Entity;
use sam_schemas::{Kind, Manifest};
use serde_json::{json, Map, Value};

use super::manifest_from_json;
use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{BrokerContext, Resource, SamResult};

const FIELDS: &[FieldMapping] = &[
    FieldMapping::new("/connection/baseUrl", "base_url"),
    FieldMapping::reference("/connection/apiKey", "api_key_id", RefTarget::Kind(Kind::Secret)),
    FieldMapping::new("/connection/authMethod", "auth_method"),
    FieldMapping::new("/connection/timeout", "timeout"),
    FieldMapping::new("/connection/proxyProtocol", "proxy_protocol"),
    FieldMapping::new("/connection/proxyHost", "proxy_host"),
    FieldMapping::new("/connection/proxyPort", "proxy_port"),
    FieldMapping::new("/connection/proxyUsername", "proxy_username"),
    FieldMapping::reference(
        "/connection/proxyPassword",
        "proxy_password_id",
        RefTarget::Kind(Kind::Secret),
    ),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::ApiConnection, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "ApiConnection",
        "metadata": {
            "name": "example_api_connection",
            "description": "Weather service REST API",
            "version": "1.0.0"
        },
        "spec": {
            "connection": {
                "baseUrl": "https://weather.example.com/api/",
                "apiKey": "example_secret",
                "authMethod": "token",
                "timeout": 15
            }
        }
    }))
}

pub struct ApiConnectionResource;

#[async_trait]
impl Resource for ApiConnectionResource {
    fn kind(&self) -> Kind {
        Kind::ApiConnection
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    async fn status(&self, _ctx: &BrokerContext, entity: &Entity) -> SamResult<Map<String, Value>> {
        let mut status = Map::new();
        if let Some(base) = entity.field_str("base_url") {
            status.insert("connectionString".into(), json!(base));
        }
        if let (Some(protocol), Some(host)) =
            (entity.field_str("proxy_protocol"), entity.field_str("proxy_host"))
        {
            let port = entity.field("proxy_port").cloned().unwrap_or(Value::Null);
            status.insert("proxy".into(), json!(format!("{protocol}://{host}:{port}")));
        }
        status.insert(
            "authenticated".into(),
            json!(entity.field_str("auth_method").is_some_and(|m| m != "none")),
        );
        Ok(status)
    }
}
