use serde::{Deserialize, Serialize};

use crate::validators::{require_non_empty, validate_email};
use crate::SchemaResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UserSpec {
    pub config: UserConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UserConfig {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
}

fn default_true() -> bool {
    true
}

impl UserSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        let c = &self.config;
        require_non_empty("spec.config.firstName", &c.first_name)?;
        require_non_empty("spec.config.lastName", &c.last_name)?;
        validate_email("spec.config.email", &c.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_email_names_the_field() {
        let spec: UserSpec = serde_json::from_value(json!({"config": {
            "firstName": "John", "lastName": "Doe", "email": "joe-at-mail"
        }}))
        .unwrap();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.field_name(), Some("spec.config.email"));
    }

    #[test]
    fn flags_default_to_active_non_staff() {
        let spec: UserSpec = serde_json::from_value(json!({"config": {
            "firstName": "John", "lastName": "Doe", "email": "joe@mail.com"
        }}))
        .unwrap();
        assert!(spec.config.is_active);
        assert!(!spec.config.is_staff);
    }
}
