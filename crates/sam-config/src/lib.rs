//! Layered service configuration for the SAM daemon and CLI.
//!
//! YAML documents are merged in order (later documents override earlier
//! ones), converted to JSON, checked for secret literals, and hashed over
//! their canonical JSON form. Secrets never live in config: the YAML holds
//! env-var NAMES which [`secrets::resolve_secrets`] reads once at start-up.

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub use secrets::{resolve_secrets, ResolvedSecrets, ResolvedToken};

/// Leaf string values starting with any of these abort loading with
/// CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI / Anthropic style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
];

/// Env var read by binaries for the comma-separated config path list.
pub const CONFIG_PATHS_ENV: &str = "SAM_CONFIG";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8899";
pub const DEFAULT_PLATFORM_DOMAIN: &str = "smarter.sh";
pub const DEFAULT_DATABASE_URL_ENV: &str = "SAM_DATABASE_URL";
pub const DEFAULT_LOG_FILTER: &str = "info";

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

/// Which binary is reading the config. Each consumer reads a different
/// subset of keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigConsumer {
    Daemon,
    Cli,
}

impl ConfigConsumer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigConsumer::Daemon => "DAEMON",
            ConfigConsumer::Cli => "CLI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumer: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes each consumer actually reads.
///
/// A leaf under any listed prefix counts as consumed. Keep this in step
/// with [`ServiceConfig::from_json`] and the CLI's config reads.
pub fn consumed_pointers(consumer: ConfigConsumer) -> &'static [&'static str] {
    match consumer {
        ConfigConsumer::Daemon => &[
            "/server/bind_addr",
            "/server/platform_domain",
            "/store/backend",
            "/store/database_url_env",
            "/logging/filter",
            "/auth/tokens",
        ],
        ConfigConsumer::Cli => &["/cli/api_url", "/cli/token_env", "/logging/filter"],
    }
}

/// Report config leaves nobody reads. `Fail` turns a non-empty report into
/// an error; `Warn` always returns the report.
pub fn report_unused_keys(
    consumer: ConfigConsumer,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers(consumer)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|p| is_prefix_pointer(p, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumer: consumer.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (consumer={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.consumer,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading "/", no trailing "/" unless the pointer is the root.
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                collect_leaf_pointers(vv, &format!("{prefix}/{}", escape_pointer_token(k)), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs = Vec::with_capacity(paths.len());
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Split a comma-separated path list (the `SAM_CONFIG` format).
pub fn split_config_paths(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Load from `SAM_CONFIG` when set; an unset or empty variable yields the
/// empty config so every default applies.
pub fn load_from_env() -> Result<LoadedConfig> {
    match std::env::var(CONFIG_PATHS_ENV) {
        Ok(list) if !list.trim().is_empty() => load_layered_yaml(&split_config_paths(&list)),
        _ => load_layered_yaml_from_strings(&[]),
    }
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses to null and contributes nothing.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// serde_json's default map is key-sorted, so this is stable regardless of
/// YAML key order.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed service config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub platform_domain: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            platform_domain: DEFAULT_PLATFORM_DOMAIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Name of the env var holding the database URL.
    pub database_url_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// One API key the daemon accepts. The key itself is read from `key_env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    pub key_env: String,
    pub account: String,
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// Daemon settings. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

impl ServiceConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: ServiceConfig = serde_json::from_value(config_json.clone())
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.server.bind_addr.trim().is_empty() {
            bail!("CONFIG_INVALID: server.bind_addr must not be empty");
        }
        if self.server.platform_domain.trim().is_empty() {
            bail!("CONFIG_INVALID: server.platform_domain must not be empty");
        }
        if self.store.backend == StoreBackend::Postgres
            && self.store.database_url_env.trim().is_empty()
        {
            bail!("CONFIG_INVALID: store.database_url_env is required for the postgres backend");
        }
        for (i, t) in self.auth.tokens.iter().enumerate() {
            if t.key_env.trim().is_empty() || t.account.trim().is_empty() || t.username.trim().is_empty() {
                bail!("CONFIG_INVALID: auth.tokens[{i}] needs key_env, account and username");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pointer_prefix_respects_segment_boundaries() {
        assert!(is_prefix_pointer("/auth/tokens", "/auth/tokens/0/key_env"));
        assert!(is_prefix_pointer("/store", "/store"));
        assert!(!is_prefix_pointer("/store", "/storefront/x"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn normalize_pointer_adds_leading_and_strips_trailing_slash() {
        assert_eq!(normalize_pointer("server/bind_addr/"), "/server/bind_addr");
        assert_eq!(normalize_pointer(""), "/");
    }

    #[test]
    fn empty_config_yields_defaults() {
        let cfg = ServiceConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg.server.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert!(cfg.auth.tokens.is_empty());
    }

    #[test]
    fn unknown_backend_is_invalid() {
        let err = ServiceConfig::from_json(&json!({"store": {"backend": "sqlite"}})).unwrap_err();
        assert!(err.to_string().starts_with("CONFIG_INVALID"), "{err}");
    }

    #[test]
    fn split_paths_ignores_blanks() {
        assert_eq!(
            split_config_paths(" base.yaml, ,local.yaml,"),
            vec!["base.yaml", "local.yaml"]
        );
    }

    #[test]
    fn short_strings_are_not_secrets() {
        assert!(!looks_like_secret("sk-1"));
        assert!(looks_like_secret("sk-proj-0123456789"));
    }
}
