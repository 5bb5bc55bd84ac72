use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::validators::require_non_empty;
use crate::SchemaResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SecretSpec {
    pub config: SecretConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SecretConfig {
    /// Plain-text value on input; redacted whenever a Secret is rendered
    /// back to a caller.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
}

impl SecretSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        require_non_empty("spec.config.value", &self.config.value)
    }
}
