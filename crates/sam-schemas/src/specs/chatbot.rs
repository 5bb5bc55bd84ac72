use serde::{Deserialize, Serialize};

use crate::validators::{
    require_non_empty, validate_dns_label, validate_domain, validate_name, validate_range,
    validate_url,
};
use crate::{SchemaError, SchemaResult};

use super::plugin::MAX_TEMPERATURE;

/// A deployable LLM application assembled from plugins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatbotSpec {
    pub config: ChatbotConfig,
    /// Names of plugins (any plugin kind) attached to this chatbot.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Names of built-in functions the LLM may call.
    #[serde(default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChatbotConfig {
    pub provider: String,
    pub default_model: String,
    pub default_system_role: String,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    pub app_name: String,
    pub app_assistant: String,
    pub app_welcome_message: String,
    #[serde(default)]
    pub app_example_prompts: Vec<String>,
    pub app_placeholder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_info_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
}

impl ChatbotSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        let c = &self.config;
        require_non_empty("spec.config.provider", &c.provider)?;
        require_non_empty("spec.config.defaultModel", &c.default_model)?;
        require_non_empty("spec.config.defaultSystemRole", &c.default_system_role)?;
        validate_range(
            "spec.config.defaultTemperature",
            c.default_temperature,
            0.0,
            MAX_TEMPERATURE,
        )?;
        if c.default_max_tokens == 0 {
            return Err(SchemaError::field(
                "spec.config.defaultMaxTokens",
                "must be positive",
            ));
        }
        require_non_empty("spec.config.appName", &c.app_name)?;
        require_non_empty("spec.config.appAssistant", &c.app_assistant)?;
        require_non_empty("spec.config.appWelcomeMessage", &c.app_welcome_message)?;
        require_non_empty("spec.config.appPlaceholder", &c.app_placeholder)?;
        for (i, prompt) in c.app_example_prompts.iter().enumerate() {
            require_non_empty(&format!("spec.config.appExamplePrompts[{i}]"), prompt)?;
        }
        if let Some(url) = &c.app_info_url {
            validate_url("spec.config.appInfoUrl", url)?;
        }
        if let Some(sub) = &c.subdomain {
            validate_dns_label("spec.config.subdomain", sub)?;
        }
        if let Some(domain) = &c.custom_domain {
            validate_domain("spec.config.customDomain", domain)?;
        }

        unique_names("spec.plugins", &self.plugins)?;
        unique_names("spec.functions", &self.functions)
    }
}

fn unique_names(field: &str, names: &[String]) -> SchemaResult<()> {
    for (i, name) in names.iter().enumerate() {
        let f = format!("{field}[{i}]");
        validate_name(&f, name)?;
        if names[..i].contains(name) {
            return Err(SchemaError::field(f, format!("'{name}' is listed twice")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn config() -> Value {
        json!({
            "provider": "openai",
            "defaultModel": "gpt-4o-mini",
            "defaultSystemRole": "You are a helpful assistant.",
            "defaultTemperature": 0.5,
            "defaultMaxTokens": 256,
            "appName": "Support",
            "appAssistant": "Sam",
            "appWelcomeMessage": "Hi!",
            "appExamplePrompts": ["What can you do?"],
            "appPlaceholder": "Ask me anything"
        })
    }

    #[test]
    fn minimal_chatbot_is_valid() {
        let spec: ChatbotSpec = serde_json::from_value(json!({"config": config()})).unwrap();
        spec.validate().unwrap();
        assert!(spec.plugins.is_empty());
    }

    #[test]
    fn duplicate_plugin_is_rejected() {
        let spec: ChatbotSpec = serde_json::from_value(json!({
            "config": config(),
            "plugins": ["weather", "weather"]
        }))
        .unwrap();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.field_name(), Some("spec.plugins[1]"));
    }

    #[test]
    fn subdomain_must_be_a_dns_label() {
        let mut cfg = config();
        cfg["subdomain"] = json!("Not_A_Label");
        let spec: ChatbotSpec = serde_json::from_value(json!({"config": cfg})).unwrap();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.field_name(), Some("spec.config.subdomain"));
    }
}
