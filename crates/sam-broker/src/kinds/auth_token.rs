use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::Entity;
use sam_schemas::{Kind, KindSpec, Manifest};
use serde_json::json;

use super::manifest_from_json;
use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{Activation, BrokerContext, Resource, SamError, SamResult};

const FIELDS: &[FieldMapping] = &[
    FieldMapping::reference("/config/username", "user_id", RefTarget::Kind(Kind::User)),
    FieldMapping::new("/config/isActive", "is_active"),
    FieldMapping::new("/config/description", "description"),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::AuthToken, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "AuthToken",
        "metadata": {
            "name": "example_token",
            "description": "CI pipeline token",
            "version": "1.0.0"
        },
        "spec": {
            "config": {
                "username": "example_user",
                "isActive": true,
                "description": "used by the nightly deploy job"
            }
        }
    }))
}

/// `deploy`/`undeploy` flip `isActive`; no provisioning is involved.
pub struct AuthTokenResource;

#[async_trait]
impl Resource for AuthTokenResource {
    fn kind(&self) -> Kind {
        Kind::AuthToken
    }

    fn field_map(&self) -> &'static FieldMap {
        field_map()
    }

    fn example(&self) -> SamResult<Manifest> {
        example_manifest()
    }

    fn activation(&self) -> Option<Activation> {
        Some(Activation {
            column: "is_active",
            provision: false,
        })
    }

    async fn check_apply(
        &self,
        ctx: &BrokerContext,
        manifest: &Manifest,
        _existing: Option<&Entity>,
    ) -> SamResult<()> {
        let KindSpec::AuthToken(spec) = manifest.spec() else {
            return Ok(());
        };
        if !ctx.request.is_staff && spec.config.username != ctx.request.username {
            return Err(SamError::business_rule(format!(
                "only staff may manage tokens for user '{}'",
                spec.config.username
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{testing::context, user};
    use crate::{Broker, ResourceBroker};

    #[tokio::test]
    async fn deploy_toggles_is_active() {
        let (ctx, mut rx) = context();
        ResourceBroker::new(ctx.clone(), crate::kinds::UserResource)
            .apply(&user::example_manifest().unwrap())
            .await
            .unwrap();

        let mut tokens = ResourceBroker::new(ctx.clone(), AuthTokenResource);
        tokens.apply(&example_manifest().unwrap()).await.unwrap();

        let off = tokens.undeploy("example_token").await.unwrap();
        assert_eq!(off.spec_value()["config"]["isActive"], json!(false));
        let on = tokens.deploy("example_token").await.unwrap();
        assert_eq!(on.spec_value()["config"]["isActive"], json!(true));
        assert!(rx.try_recv().is_err(), "tokens never provision");
    }

    #[tokio::test]
    async fn unknown_user_is_a_validation_error() {
        let (ctx, _rx) = context();
        let mut tokens = ResourceBroker::new(ctx, AuthTokenResource);
        let err = tokens.apply(&example_manifest().unwrap()).await.unwrap_err();
        assert_eq!(err.class(), "ValidationError");
        assert!(err.to_string().starts_with("spec.config.username"), "{err}");
    }
}
