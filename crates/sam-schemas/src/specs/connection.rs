//! Connection-family specs: remote REST APIs and SQL databases that plugins
//! read from. Credentials are never inlined; they name a `Secret`.

use serde::{Deserialize, Serialize};

use crate::validators::{require_non_empty, validate_name, validate_range, validate_url};
use crate::{SchemaError, SchemaResult};

pub const MIN_TIMEOUT_SECS: u32 = 1;
pub const MAX_TIMEOUT_SECS: u32 = 300;
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

// ---------------------------------------------------------------------------
// ApiConnection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiConnectionSpec {
    pub connection: ApiConnectionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    None,
    Basic,
    Token,
    Oauth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks => "socks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiConnectionConfig {
    pub base_url: String,
    /// Name of the `Secret` holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_protocol: Option<ProxyProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_username: Option<String>,
    /// Name of the `Secret` holding the proxy password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_password: Option<String>,
}

impl ApiConnectionSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        let c = &self.connection;
        validate_url("spec.connection.baseUrl", &c.base_url)?;
        validate_range("spec.connection.timeout", c.timeout, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)?;

        match (&c.api_key, c.auth_method) {
            (None, AuthMethod::None) => {}
            (None, method) => {
                return Err(SchemaError::field(
                    "spec.connection.apiKey",
                    format!("is required when authMethod is {}", serde_label(method)),
                ))
            }
            (Some(key), _) => validate_name("spec.connection.apiKey", key)?,
        }

        // Proxy settings are all-or-nothing for the addressing triple.
        let addressed = [
            c.proxy_protocol.is_some(),
            c.proxy_host.is_some(),
            c.proxy_port.is_some(),
        ];
        if addressed.iter().any(|b| *b) && !addressed.iter().all(|b| *b) {
            return Err(SchemaError::field(
                "spec.connection.proxyHost",
                "proxyProtocol, proxyHost and proxyPort must be given together",
            ));
        }
        if c.proxy_host.is_none() && (c.proxy_username.is_some() || c.proxy_password.is_some()) {
            return Err(SchemaError::field(
                "spec.connection.proxyUsername",
                "proxy credentials require proxyHost",
            ));
        }
        if let Some(host) = &c.proxy_host {
            require_non_empty("spec.connection.proxyHost", host)?;
        }
        if let Some(password) = &c.proxy_password {
            validate_name("spec.connection.proxyPassword", password)?;
        }
        Ok(())
    }
}

fn serde_label(method: AuthMethod) -> &'static str {
    match method {
        AuthMethod::None => "none",
        AuthMethod::Basic => "basic",
        AuthMethod::Token => "token",
        AuthMethod::Oauth => "oauth",
    }
}

// ---------------------------------------------------------------------------
// SqlConnection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SqlConnectionSpec {
    pub connection: SqlConnectionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    Postgresql,
    Mysql,
    Sqlite,
    Oracle,
    Mssql,
}

impl DbEngine {
    /// URL scheme used when rendering a connection string.
    pub fn scheme(&self) -> &'static str {
        match self {
            DbEngine::Postgresql => "postgresql",
            DbEngine::Mysql => "mysql",
            DbEngine::Sqlite => "sqlite",
            DbEngine::Oracle => "oracle",
            DbEngine::Mssql => "mssql",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SqlConnectionConfig {
    pub db_engine: DbEngine,
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    /// Name of the `Secret` holding the database password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub use_ssl: bool,
}

impl SqlConnectionSpec {
    pub fn validate(&self) -> SchemaResult<()> {
        let c = &self.connection;
        require_non_empty("spec.connection.hostname", &c.hostname)?;
        if c.hostname.contains(char::is_whitespace) || c.hostname.contains('/') {
            return Err(SchemaError::field(
                "spec.connection.hostname",
                format!("'{}' is not a hostname", c.hostname),
            ));
        }
        if c.port == 0 {
            return Err(SchemaError::field("spec.connection.port", "must be non-zero"));
        }
        require_non_empty("spec.connection.database", &c.database)?;
        require_non_empty("spec.connection.username", &c.username)?;
        if let Some(password) = &c.password {
            validate_name("spec.connection.password", password)?;
        }
        validate_range("spec.connection.timeout", c.timeout, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(connection: serde_json::Value) -> ApiConnectionSpec {
        serde_json::from_value(json!({ "connection": connection })).unwrap()
    }

    #[test]
    fn token_auth_requires_api_key() {
        let spec = api(json!({"baseUrl": "https://api.example.com", "authMethod": "token"}));
        let err = spec.validate().unwrap_err();
        assert_eq!(err.field_name(), Some("spec.connection.apiKey"));
    }

    #[test]
    fn partial_proxy_is_rejected() {
        let spec = api(json!({
            "baseUrl": "https://api.example.com",
            "proxyHost": "proxy.internal"
        }));
        assert!(spec.validate().is_err());

        let full = api(json!({
            "baseUrl": "https://api.example.com",
            "proxyProtocol": "https",
            "proxyHost": "proxy.internal",
            "proxyPort": 3128
        }));
        full.validate().unwrap();
    }

    #[test]
    fn timeout_outside_range_is_rejected() {
        let spec = api(json!({"baseUrl": "https://api.example.com", "timeout": 0}));
        let err = spec.validate().unwrap_err();
        assert_eq!(err.field_name(), Some("spec.connection.timeout"));
    }

    #[test]
    fn sql_connection_defaults() {
        let spec: SqlConnectionSpec = serde_json::from_value(json!({"connection": {
            "dbEngine": "postgresql",
            "hostname": "db.internal",
            "port": 5432,
            "database": "smarter",
            "username": "reader"
        }}))
        .unwrap();
        spec.validate().unwrap();
        assert_eq!(spec.connection.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(!spec.connection.use_ssl);
    }

    #[test]
    fn unknown_db_engine_fails_to_decode() {
        let r: Result<SqlConnectionSpec, _> = serde_json::from_value(json!({"connection": {
            "dbEngine": "db2", "hostname": "h", "port": 1, "database": "d", "username": "u"
        }}));
        assert!(r.is_err());
    }
}
