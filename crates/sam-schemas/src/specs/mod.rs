//! Per-kind `spec` sections.
//!
//! Every struct here uses `deny_unknown_fields` and camelCase field names on
//! the wire. Shape errors come from serde; semantic rules (patterns, ranges,
//! cross-field constraints) from each section's `validate`.

pub mod account;
pub mod auth_token;
pub mod chat;
pub mod chatbot;
pub mod connection;
pub mod plugin;
pub mod secret;
pub mod user;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Kind, SchemaError, SchemaResult};

pub use account::{AccountConfig, AccountSpec};
pub use chat::{ChatConfig, ChatLogConfig, ChatLogSpec, ChatSpec};
pub use chatbot::{ChatbotConfig, ChatbotSpec};
pub use connection::{
    ApiConnectionConfig, ApiConnectionSpec, AuthMethod, DbEngine, ProxyProtocol,
    SqlConnectionConfig, SqlConnectionSpec,
};
pub use plugin::{
    ApiData, HttpMethod, KeyValue, ParameterType, PluginData, PluginParameter, PluginPrompt,
    PluginSelector, PluginSpec, SelectorDirective, SqlData, TestValue,
};
pub use auth_token::{AuthTokenConfig, AuthTokenSpec};
pub use secret::{SecretConfig, SecretSpec};
pub use user::{UserConfig, UserSpec};

/// The typed `spec` of a manifest, one variant per [`Kind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KindSpec {
    Account(AccountSpec),
    User(UserSpec),
    Secret(SecretSpec),
    AuthToken(AuthTokenSpec),
    ApiConnection(ApiConnectionSpec),
    SqlConnection(SqlConnectionSpec),
    StaticPlugin(PluginSpec),
    SqlPlugin(PluginSpec),
    ApiPlugin(PluginSpec),
    Chatbot(ChatbotSpec),
    Chat(ChatSpec),
    ChatHistory(ChatLogSpec),
    ChatPluginUsage(ChatLogSpec),
    ChatToolCall(ChatLogSpec),
}

impl KindSpec {
    /// Decode and validate the `spec` object for `kind`.
    pub fn parse(kind: Kind, value: Value) -> SchemaResult<Self> {
        if !value.is_object() {
            return Err(SchemaError::field("spec", "must be a mapping"));
        }
        let spec = match kind {
            Kind::Account => KindSpec::Account(decode(value)?),
            Kind::User => KindSpec::User(decode(value)?),
            Kind::Secret => KindSpec::Secret(decode(value)?),
            Kind::AuthToken => KindSpec::AuthToken(decode(value)?),
            Kind::ApiConnection => KindSpec::ApiConnection(decode(value)?),
            Kind::SqlConnection => KindSpec::SqlConnection(decode(value)?),
            Kind::StaticPlugin => KindSpec::StaticPlugin(decode(value)?),
            Kind::SqlPlugin => KindSpec::SqlPlugin(decode(value)?),
            Kind::ApiPlugin => KindSpec::ApiPlugin(decode(value)?),
            Kind::Chatbot => KindSpec::Chatbot(decode(value)?),
            Kind::Chat => KindSpec::Chat(decode(value)?),
            Kind::ChatHistory => KindSpec::ChatHistory(decode(value)?),
            Kind::ChatPluginUsage => KindSpec::ChatPluginUsage(decode(value)?),
            Kind::ChatToolCall => KindSpec::ChatToolCall(decode(value)?),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn kind(&self) -> Kind {
        match self {
            KindSpec::Account(_) => Kind::Account,
            KindSpec::User(_) => Kind::User,
            KindSpec::Secret(_) => Kind::Secret,
            KindSpec::AuthToken(_) => Kind::AuthToken,
            KindSpec::ApiConnection(_) => Kind::ApiConnection,
            KindSpec::SqlConnection(_) => Kind::SqlConnection,
            KindSpec::StaticPlugin(_) => Kind::StaticPlugin,
            KindSpec::SqlPlugin(_) => Kind::SqlPlugin,
            KindSpec::ApiPlugin(_) => Kind::ApiPlugin,
            KindSpec::Chatbot(_) => Kind::Chatbot,
            KindSpec::Chat(_) => Kind::Chat,
            KindSpec::ChatHistory(_) => Kind::ChatHistory,
            KindSpec::ChatPluginUsage(_) => Kind::ChatPluginUsage,
            KindSpec::ChatToolCall(_) => Kind::ChatToolCall,
        }
    }

    pub fn validate(&self) -> SchemaResult<()> {
        match self {
            KindSpec::Account(s) => s.validate(),
            KindSpec::User(s) => s.validate(),
            KindSpec::Secret(s) => s.validate(),
            KindSpec::AuthToken(s) => s.validate(),
            KindSpec::ApiConnection(s) => s.validate(),
            KindSpec::SqlConnection(s) => s.validate(),
            KindSpec::StaticPlugin(s) | KindSpec::SqlPlugin(s) | KindSpec::ApiPlugin(s) => {
                s.validate_for(self.kind())
            }
            KindSpec::Chatbot(s) => s.validate(),
            KindSpec::Chat(s) => s.validate(),
            KindSpec::ChatHistory(s) | KindSpec::ChatPluginUsage(s) | KindSpec::ChatToolCall(s) => {
                s.validate()
            }
        }
    }

    /// The camelCase JSON form of this spec, as it appears in a manifest.
    pub fn to_value(&self) -> Value {
        // Every section is plain data with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> SchemaResult<T> {
    serde_json::from_value(value).map_err(|e| SchemaError::field("spec", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_spec_key_is_a_field_error() {
        let err = KindSpec::parse(
            Kind::User,
            json!({"config": {
                "firstName": "J", "lastName": "D", "email": "j@d.io", "nickname": "jd"
            }}),
        )
        .unwrap_err();
        assert_eq!(err.field_name(), Some("spec"));
        assert!(err.to_string().contains("nickname"), "{err}");
    }

    #[test]
    fn non_object_spec_is_rejected() {
        assert!(KindSpec::parse(Kind::User, json!("nope")).is_err());
    }

    #[test]
    fn parsed_spec_reports_its_kind() {
        let spec = KindSpec::parse(
            Kind::Chat,
            json!({"config": {"chatbot": "support_bot"}}),
        )
        .unwrap();
        assert_eq!(spec.kind(), Kind::Chat);
        assert_eq!(spec.to_value(), json!({"config": {"chatbot": "support_bot"}}));
    }
}
