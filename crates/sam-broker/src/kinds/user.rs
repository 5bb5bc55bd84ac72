use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::Entity;
use sam_schemas::{Kind, KindSpec, Manifest};
use serde_json::json;

use super::manifest_from_json;
use crate::mapping::{FieldMap, FieldMapping};
use crate::{BrokerContext, Resource, SamError, SamResult};

const FIELDS: &[FieldMapping] = &[
    FieldMapping::new("/config/firstName", "first_name"),
    FieldMapping::new("/config/lastName", "last_name"),
    FieldMapping::new("/config/email", "email"),
    FieldMapping::new("/config/isActive", "is_active"),
    FieldMapping::new("/config/isStaff", "is_staff"),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::User, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "User",
        "metadata": {
            "name": "example_user",
            "description": "an example user",
            "version": "1.0.0"
        },
        "spec": {
            "config": {
                "firstName": "John",
                "lastName": "Doe",
                "email": "joe@mail.com",
                "isActive": true,
                "isStaff": false
            }
        }
    }))
}

pub struct UserResource;

#[async_trait]
impl Resource for UserResource {
    fn kind(&self) -> Kind {
        Kind::User
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    async fn check_apply(
        &self,
        ctx: &BrokerContext,
        manifest: &Manifest,
        existing: Option<&Entity>,
    ) -> SamResult<()> {
        let KindSpec::User(spec) = manifest.spec() else {
            return Ok(());
        };
        let was_staff = existing.and_then(|e| e.field_bool("is_staff")).unwrap_or(false);
        if spec.config.is_staff && !was_staff && !ctx.request.is_staff {
            return Err(SamError::business_rule(format!(
                "only staff may grant staff status to user '{}'",
                manifest.name()
            )));
        }
        Ok(())
    }

    async fn check_delete(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<()> {
        if entity.name == ctx.request.username {
            return Err(SamError::business_rule(format!(
                "user '{}' is the calling user and cannot be deleted",
                entity.name
            )));
        }
        Ok(())
    }
}
