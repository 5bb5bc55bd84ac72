use serde::{Deserialize, Serialize};

use crate::validators::validate_name;
use crate::SchemaResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AuthTokenSpec {
    pub config: AuthTokenConfig,
}

/// An API key bound to a user of the account. The key material itself is
/// issued elsewhere; the manifest only controls ownership and activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AuthTokenConfig {
    /// Name of a `User` in the same account.
    pub username: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl AuthTokenSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        validate_name("spec.config.username", &self.config.username)
    }
}
