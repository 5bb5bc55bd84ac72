use serde::{Deserialize, Serialize};

use crate::validators::{require_non_empty, validate_clean_string};
use crate::{SchemaError, SchemaResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AccountSpec {
    pub config: AccountConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AccountConfig {
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// ISO 4217 code, e.g. `USD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl AccountSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        let c = &self.config;
        require_non_empty("spec.config.companyName", &c.company_name)?;
        validate_clean_string("spec.config.language", &c.language)?;
        if let Some(currency) = &c.currency {
            if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
                return Err(SchemaError::field(
                    "spec.config.currency",
                    format!("'{currency}' is not an ISO 4217 currency code"),
                ));
            }
        }
        if let Some(phone) = &c.phone_number {
            let ok = phone
                .chars()
                .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | ' ' | '(' | ')' | '.'));
            if !ok {
                return Err(SchemaError::field(
                    "spec.config.phoneNumber",
                    format!("'{phone}' is not a phone number"),
                ));
            }
        }
        Ok(())
    }
}
