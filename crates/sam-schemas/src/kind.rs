//! The closed set of manifest kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{SchemaError, SchemaResult};

/// Resource-type discriminator carried in a manifest's `kind` field.
///
/// Variant names are the canonical (case-sensitive) spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Account,
    User,
    Secret,
    AuthToken,
    ApiConnection,
    SqlConnection,
    StaticPlugin,
    SqlPlugin,
    ApiPlugin,
    Chatbot,
    Chat,
    ChatHistory,
    ChatPluginUsage,
    ChatToolCall,
}

/// Coarse grouping used by the registry helper queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFamily {
    Identity,
    Connection,
    Plugin,
    Chatbot,
    Chat,
    /// Append-only records written by the chat pipeline; never writable
    /// through a manifest.
    ChatLog,
}

impl Kind {
    pub const ALL: [Kind; 14] = [
        Kind::Account,
        Kind::User,
        Kind::Secret,
        Kind::AuthToken,
        Kind::ApiConnection,
        Kind::SqlConnection,
        Kind::StaticPlugin,
        Kind::SqlPlugin,
        Kind::ApiPlugin,
        Kind::Chatbot,
        Kind::Chat,
        Kind::ChatHistory,
        Kind::ChatPluginUsage,
        Kind::ChatToolCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Account => "Account",
            Kind::User => "User",
            Kind::Secret => "Secret",
            Kind::AuthToken => "AuthToken",
            Kind::ApiConnection => "ApiConnection",
            Kind::SqlConnection => "SqlConnection",
            Kind::StaticPlugin => "StaticPlugin",
            Kind::SqlPlugin => "SqlPlugin",
            Kind::ApiPlugin => "ApiPlugin",
            Kind::Chatbot => "Chatbot",
            Kind::Chat => "Chat",
            Kind::ChatHistory => "ChatHistory",
            Kind::ChatPluginUsage => "ChatPluginUsage",
            Kind::ChatToolCall => "ChatToolCall",
        }
    }

    pub fn family(&self) -> KindFamily {
        match self {
            Kind::Account | Kind::User | Kind::Secret | Kind::AuthToken => KindFamily::Identity,
            Kind::ApiConnection | Kind::SqlConnection => KindFamily::Connection,
            Kind::StaticPlugin | Kind::SqlPlugin | Kind::ApiPlugin => KindFamily::Plugin,
            Kind::Chatbot => KindFamily::Chatbot,
            Kind::Chat => KindFamily::Chat,
            Kind::ChatHistory | Kind::ChatPluginUsage | Kind::ChatToolCall => KindFamily::ChatLog,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.family() == KindFamily::ChatLog
    }

    /// Lower-case singular URL slug, e.g. `sqlconnection`.
    pub fn slug(&self) -> &'static str {
        match self {
            Kind::Account => "account",
            Kind::User => "user",
            Kind::Secret => "secret",
            Kind::AuthToken => "authtoken",
            Kind::ApiConnection => "apiconnection",
            Kind::SqlConnection => "sqlconnection",
            Kind::StaticPlugin => "staticplugin",
            Kind::SqlPlugin => "sqlplugin",
            Kind::ApiPlugin => "apiplugin",
            Kind::Chatbot => "chatbot",
            Kind::Chat => "chat",
            Kind::ChatHistory => "chathistory",
            Kind::ChatPluginUsage => "chatpluginusage",
            Kind::ChatToolCall => "chattoolcall",
        }
    }

    /// Lower-case plural URL slug, e.g. `chathistories`.
    pub fn plural_slug(&self) -> &'static str {
        match self {
            Kind::Account => "accounts",
            Kind::User => "users",
            Kind::Secret => "secrets",
            Kind::AuthToken => "authtokens",
            Kind::ApiConnection => "apiconnections",
            Kind::SqlConnection => "sqlconnections",
            Kind::StaticPlugin => "staticplugins",
            Kind::SqlPlugin => "sqlplugins",
            Kind::ApiPlugin => "apiplugins",
            Kind::Chatbot => "chatbots",
            Kind::Chat => "chats",
            Kind::ChatHistory => "chathistories",
            Kind::ChatPluginUsage => "chatpluginusages",
            Kind::ChatToolCall => "chattoolcalls",
        }
    }

    /// Case-sensitive lookup on the canonical spelling.
    pub fn parse(s: &str) -> SchemaResult<Kind> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownKind(s.to_string()))
    }

    /// Case-insensitive lookup accepting the canonical name, the singular
    /// slug, or the plural slug. Used for kinds taken from URL path segments.
    pub fn from_slug(s: &str) -> SchemaResult<Kind> {
        let wanted = s.trim().to_ascii_lowercase();
        Kind::ALL
            .into_iter()
            .find(|k| k.slug() == wanted || k.plural_slug() == wanted)
            .ok_or_else(|| SchemaError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::parse(s)
    }
}
