use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sam_db::Entity;
use sam_schemas::{Kind, Manifest};
use serde_json::{json, Map, Value};

use super::{manifest_from_json, mask};
use crate::mapping::{FieldMap, FieldMapping};
use crate::{BrokerContext, Resource, SamResult};

const FIELDS: &[FieldMapping] = &[
    FieldMapping::new("/config/value", "value"),
    FieldMapping::new("/config/description", "description"),
    FieldMapping::new("/config/expirationDate", "expiration_date"),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::Secret, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "Secret",
        "metadata": {
            "name": "example_secret",
            "description": "API key for the weather service",
            "version": "1.0.0"
        },
        "spec": {
            "config": {
                "value": "replace-me",
                "description": "weather.example.com key",
                "expirationDate": "2030-12-31"
            }
        }
    }))
}

/// Secret values are stored as given and masked on every outgoing manifest.
pub struct SecretResource;

#[async_trait]
impl Resource for SecretResource {
    fn kind(&self) -> Kind {
        Kind::Secret
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    fn redact(&self, spec: &mut Value) {
        mask(spec, "/config/value");
    }

    async fn status(&self, _ctx: &BrokerContext, entity: &Entity) -> SamResult<Map<String, Value>> {
        let mut status = Map::new();
        if let Some(date) = entity
            .field_str("expiration_date")
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        {
            status.insert("expired".into(), json!(date < Utc::now().date_naive()));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{testing::context, MASK};
    use crate::{Broker, ResourceBroker};

    #[tokio::test]
    async fn value_is_masked_on_output_but_stored_intact() {
        let (ctx, _rx) = context();
        let mut broker = ResourceBroker::new(ctx.clone(), SecretResource);
        let applied = broker.apply(&example_manifest().unwrap()).await.unwrap();
        assert_eq!(applied.spec_value()["config"]["value"], json!(MASK));
        assert_eq!(applied.status().unwrap()["expired"], json!(false));

        let stored = ctx
            .store
            .fetch("acme", "Secret", "example_secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.field_str("value"), Some("replace-me"));

        let full = broker.entity_to_manifest(&stored).await.unwrap();
        assert_eq!(full.spec_value()["config"]["value"], json!("replace-me"));
    }
}
