use std::sync::OnceLock;

use async_trait::async_trait;
use sam_db::Entity;
use sam_schemas::{Kind, Manifest};
use serde_json::json;

use super::manifest_from_json;
use crate::mapping::{FieldMap, FieldMapping};
use crate::{BrokerContext, Resource, SamError, SamResult};

const FIELDS: &[FieldMapping] = &[
    FieldMapping::new("/config/companyName", "company_name"),
    FieldMapping::new("/config/phoneNumber", "phone_number"),
    FieldMapping::new("/config/address1", "address1"),
    FieldMapping::new("/config/address2", "address2"),
    FieldMapping::new("/config/city", "city"),
    FieldMapping::new("/config/state", "state"),
    FieldMapping::new("/config/postalCode", "postal_code"),
    FieldMapping::new("/config/country", "country"),
    FieldMapping::new("/config/timezone", "timezone"),
    FieldMapping::new("/config/currency", "currency"),
    FieldMapping::new("/config/language", "language"),
];

pub fn field_map() -> &'static FieldMap {
    static MAP: OnceLock<FieldMap> = OnceLock::new();
    MAP.get_or_init(|| FieldMap::new(Kind::Account, FIELDS.to_vec()))
}

pub fn example_manifest() -> SamResult<Manifest> {
    manifest_from_json(json!({
        "apiVersion": sam_schemas::API_VERSION,
        "kind": "Account",
        "metadata": {
            "name": "example_account",
            "description": "An example customer account",
            "version": "1.0.0",
            "tags": ["example"]
        },
        "spec": {
            "config": {
                "companyName": "Example Corp",
                "phoneNumber": "+1 (617) 555-0100",
                "address1": "1 Main St",
                "city": "Cambridge",
                "state": "MA",
                "postalCode": "02139",
                "country": "US",
                "timezone": "America/New_York",
                "currency": "USD",
                "language": "en-US"
            }
        }
    }))
}

/// Accounts are scoped to the caller: non-staff callers may only manage the
/// account they are signed in to, and nobody may delete it from within.
pub struct AccountResource;

#[async_trait]
impl Resource for AccountResource {
    fn kind(&self) -> Kind {
        Kind::Account
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
        _existing: Option<&Entity>,
    ) -> SamResult<()> {
        if !ctx.request.is_staff && manifest.name() != ctx.account() {
            return Err(SamError::business_rule(format!(
                "only staff may manage account '{}'",
                manifest.name()
            )));
        }
        Ok(())
    }

    async fn check_delete(&self, ctx: &BrokerContext, entity: &Entity) -> SamResult<()> {
        if entity.name == ctx.account() {
            return Err(SamError::business_rule(format!(
                "account '{}' is the caller's own account and cannot be deleted",
                entity.name
            )));
        }
        if !ctx.request.is_staff {
            return Err(SamError::business_rule("only staff may delete accounts"));
        }
        Ok(())
    }
}
