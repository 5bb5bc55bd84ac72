//! Plugin-family specs (`StaticPlugin`, `SqlPlugin`, `ApiPlugin`).
//!
//! All three share `selector` and `prompt`; they differ in `data`, which must
//! carry exactly one of `staticData`, `sqlData` or `apiData`, and it must be
//! the one matching the plugin kind.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validators::{
    placeholders, require_non_empty, validate_clean_string, validate_name, validate_range,
    validate_sql,
};
use crate::{Kind, SchemaError, SchemaResult};

pub const MAX_TEMPERATURE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginSpec {
    pub selector: PluginSelector,
    pub prompt: PluginPrompt,
    pub data: PluginData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectorDirective {
    /// Plugin is offered when the prompt mentions one of `searchTerms`.
    SearchTerms,
    /// Plugin is always offered.
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginSelector {
    pub directive: SelectorDirective,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginPrompt {
    pub provider: String,
    pub system_role: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginData {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_data: Option<SqlData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_data: Option<ApiData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
}

/// A caller-supplied value the LLM must provide when invoking the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PluginParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TestValue {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SqlData {
    /// Name of a `SqlConnection` in the same account.
    pub connection: String,
    pub sql_query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PluginParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_values: Vec<TestValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiData {
    /// Name of an `ApiConnection` in the same account.
    pub connection: String,
    /// Path relative to the connection's `baseUrl`; may contain `{param}` tokens.
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_params: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PluginParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_values: Vec<TestValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

impl PluginSpec {
    pub fn validate_for(&self, kind: Kind) -> SchemaResult<()> {
        self.validate_selector()?;
        self.validate_prompt()?;
        require_non_empty("spec.data.description", &self.data.description)?;

        let present: Vec<&str> = [
            self.data.static_data.as_ref().map(|_| "staticData"),
            self.data.sql_data.as_ref().map(|_| "sqlData"),
            self.data.api_data.as_ref().map(|_| "apiData"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let expected = match kind {
            Kind::StaticPlugin => "staticData",
            Kind::SqlPlugin => "sqlData",
            Kind::ApiPlugin => "apiData",
            other => {
                return Err(SchemaError::field(
                    "spec",
                    format!("{other} is not a plugin kind"),
                ))
            }
        };
        match present.as_slice() {
            [only] if *only == expected => {}
            [] => {
                return Err(SchemaError::field(
                    "spec.data",
                    format!("{kind} requires {expected}"),
                ))
            }
            [only] => {
                return Err(SchemaError::field(
                    format!("spec.data.{only}"),
                    format!("{kind} requires {expected}, not {only}"),
                ))
            }
            many => {
                return Err(SchemaError::field(
                    "spec.data",
                    format!(
                        "exactly one of staticData, sqlData, apiData is allowed (got {})",
                        many.join(", ")
                    ),
                ))
            }
        }

        if let Some(static_data) = &self.data.static_data {
            if !(static_data.is_object() || static_data.is_array()) {
                return Err(SchemaError::field(
                    "spec.data.staticData",
                    "must be a mapping or a list",
                ));
            }
        }
        if let Some(sql) = &self.data.sql_data {
            sql.validate()?;
        }
        if let Some(api) = &self.data.api_data {
            api.validate()?;
        }
        Ok(())
    }

    fn validate_selector(&self) -> SchemaResult<()> {
        let s = &self.selector;
        if s.directive == SelectorDirective::SearchTerms && s.search_terms.is_empty() {
            return Err(SchemaError::field(
                "spec.selector.searchTerms",
                "must not be empty when directive is searchTerms",
            ));
        }
        for (i, term) in s.search_terms.iter().enumerate() {
            require_non_empty(&format!("spec.selector.searchTerms[{i}]"), term)?;
        }
        Ok(())
    }

    fn validate_prompt(&self) -> SchemaResult<()> {
        let p = &self.prompt;
        require_non_empty("spec.prompt.provider", &p.provider)?;
        require_non_empty("spec.prompt.systemRole", &p.system_role)?;
        require_non_empty("spec.prompt.model", &p.model)?;
        validate_range("spec.prompt.temperature", p.temperature, 0.0, MAX_TEMPERATURE)?;
        if p.max_tokens == 0 {
            return Err(SchemaError::field("spec.prompt.maxTokens", "must be positive"));
        }
        Ok(())
    }
}

impl SqlData {
    fn validate(&self) -> SchemaResult<()> {
        validate_name("spec.data.sqlData.connection", &self.connection)?;
        let used = validate_sql("spec.data.sqlData.sqlQuery", &self.sql_query)?;
        let declared = validate_parameters("spec.data.sqlData.parameters", &self.parameters)?;
        require_declared("spec.data.sqlData.sqlQuery", &used, &declared)?;
        validate_test_values("spec.data.sqlData.testValues", &self.test_values, &declared)?;
        validate_limit("spec.data.sqlData.limit", self.limit)
    }
}

impl ApiData {
    fn validate(&self) -> SchemaResult<()> {
        validate_name("spec.data.apiData.connection", &self.connection)?;
        if !self.endpoint.starts_with('/') {
            return Err(SchemaError::field(
                "spec.data.apiData.endpoint",
                format!("'{}' must start with '/'", self.endpoint),
            ));
        }
        let declared = validate_parameters("spec.data.apiData.parameters", &self.parameters)?;
        require_declared(
            "spec.data.apiData.endpoint",
            &placeholders(&self.endpoint),
            &declared,
        )?;
        for (i, kv) in self.url_params.iter().enumerate() {
            let field = format!("spec.data.apiData.urlParams[{i}]");
            require_non_empty(&field, &kv.key)?;
            require_declared(&field, &placeholders(&kv.value), &declared)?;
        }
        for (i, kv) in self.headers.iter().enumerate() {
            let field = format!("spec.data.apiData.headers[{i}]");
            require_non_empty(&field, &kv.key)?;
            if kv.key.contains(char::is_whitespace) || kv.key.contains(':') {
                return Err(SchemaError::field(
                    field,
                    format!("'{}' is not a valid header name", kv.key),
                ));
            }
        }
        if self.body.is_some() && self.method == HttpMethod::Get {
            return Err(SchemaError::field(
                "spec.data.apiData.body",
                "GET requests cannot carry a body",
            ));
        }
        validate_test_values("spec.data.apiData.testValues", &self.test_values, &declared)?;
        validate_limit("spec.data.apiData.limit", self.limit)
    }
}

fn validate_parameters(field: &str, params: &[PluginParameter]) -> SchemaResult<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for (i, p) in params.iter().enumerate() {
        let f = format!("{field}[{i}].name");
        validate_clean_string(&f, &p.name)?;
        if !names.insert(p.name.clone()) {
            return Err(SchemaError::field(f, format!("duplicate parameter '{}'", p.name)));
        }
    }
    Ok(names)
}

fn require_declared(field: &str, used: &[String], declared: &BTreeSet<String>) -> SchemaResult<()> {
    if let Some(missing) = used.iter().find(|u| !declared.contains(*u)) {
        return Err(SchemaError::field(
            field,
            format!("placeholder {{{missing}}} is not declared in parameters"),
        ));
    }
    Ok(())
}

fn validate_test_values(
    field: &str,
    values: &[TestValue],
    declared: &BTreeSet<String>,
) -> SchemaResult<()> {
    for (i, tv) in values.iter().enumerate() {
        if !declared.contains(&tv.name) {
            return Err(SchemaError::field(
                format!("{field}[{i}].name"),
                format!("'{}' is not a declared parameter", tv.name),
            ));
        }
    }
    Ok(())
}

fn validate_limit(field: &str, limit: Option<u32>) -> SchemaResult<()> {
    match limit {
        Some(0) => Err(SchemaError::field(field, "must be positive")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(data: Value) -> PluginSpec {
        serde_json::from_value(json!({
            "selector": {"directive": "searchTerms", "searchTerms": ["admin"]},
            "prompt": {
                "provider": "openai",
                "systemRole": "You are a helpful assistant.",
                "model": "gpt-4o-mini",
                "temperature": 0.5,
                "maxTokens": 256
            },
            "data": data
        }))
        .unwrap()
    }

    #[test]
    fn static_plugin_accepts_static_data() {
        let s = spec(json!({"description": "d", "staticData": {"a": 1}}));
        s.validate_for(Kind::StaticPlugin).unwrap();
    }

    #[test]
    fn data_source_must_match_kind() {
        let s = spec(json!({"description": "d", "staticData": {"a": 1}}));
        let err = s.validate_for(Kind::SqlPlugin).unwrap_err();
        assert_eq!(err.field_name(), Some("spec.data.staticData"));
    }

    #[test]
    fn two_data_sources_are_rejected() {
        let s = spec(json!({
            "description": "d",
            "staticData": {"a": 1},
            "apiData": {"connection": "c", "endpoint": "/x"}
        }));
        let err = s.validate_for(Kind::ApiPlugin).unwrap_err();
        assert!(err.to_string().contains("exactly one"), "{err}");
    }

    #[test]
    fn sql_placeholders_must_be_declared() {
        let s = spec(json!({"description": "d", "sqlData": {
            "connection": "warehouse",
            "sqlQuery": "SELECT * FROM users WHERE name = '{username}'"
        }}));
        let err = s.validate_for(Kind::SqlPlugin).unwrap_err();
        assert!(err.to_string().contains("{username}"), "{err}");

        let ok = spec(json!({"description": "d", "sqlData": {
            "connection": "warehouse",
            "sqlQuery": "SELECT * FROM users WHERE name = '{username}'",
            "parameters": [{"name": "username", "type": "string", "required": true}],
            "testValues": [{"name": "username", "value": "admin"}]
        }}));
        ok.validate_for(Kind::SqlPlugin).unwrap();
    }

    #[test]
    fn invalid_sql_is_rejected() {
        let s = spec(json!({"description": "d", "sqlData": {
            "connection": "warehouse",
            "sqlQuery": "SELEC * FROM users"
        }}));
        let err = s.validate_for(Kind::SqlPlugin).unwrap_err();
        assert_eq!(err.field_name(), Some("spec.data.sqlData.sqlQuery"));
    }

    #[test]
    fn search_terms_directive_needs_terms() {
        let mut s = spec(json!({"description": "d", "staticData": []}));
        s.selector.search_terms.clear();
        let err = s.validate_for(Kind::StaticPlugin).unwrap_err();
        assert_eq!(err.field_name(), Some("spec.selector.searchTerms"));
    }

    #[test]
    fn temperature_is_bounded() {
        let mut s = spec(json!({"description": "d", "staticData": []}));
        s.prompt.temperature = 2.5;
        let err = s.validate_for(Kind::StaticPlugin).unwrap_err();
        assert_eq!(err.field_name(), Some("spec.prompt.temperature"));
    }

    #[test]
    fn api_get_with_body_is_rejected() {
        let s = spec(json!({"description": "d", "apiData": {
            "connection": "weather",
            "endpoint": "/forecast",
            "body": {"q": 1}
        }}));
        let err = s.validate_for(Kind::ApiPlugin).unwrap_err();
        assert_eq!(err.field_name(), Some("spec.data.apiData.body"));
    }
}
