//! Commands that call a running sam-daemon.
//!
//! Every command maps to one `/api/v1/cli/{command}/{kind}[/{name}]`
//! request. The response envelope is printed as pretty JSON on stdout; a
//! non-2xx status makes the command fail after printing.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Url};
use sam_broker::Kind;
use sam_config::{report_unused_keys, ConfigConsumer, UnusedKeyPolicy};
use sam_loader::{ManifestFormat, ManifestLoader};
use serde_json::{json, Value};
use tracing::warn;

use super::{parse_kind, read_manifest_file};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8899";
pub const API_URL_ENV: &str = "SAM_API_URL";
pub const DEFAULT_TOKEN_ENV: &str = "SAM_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    key: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

/// Non-blank env var value.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn config_str(config: &Value, pointer: &str) -> Option<String> {
    config
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ApiClient {
    /// Precedence: flag, then env, then `cli.*` in SAM_CONFIG, then default.
    pub fn from_settings(api_url: Option<&str>, token_env: Option<&str>) -> Result<Self> {
        let loaded = sam_config::load_from_env()?;
        let report = report_unused_keys(
            ConfigConsumer::Cli,
            &loaded.config_json,
            UnusedKeyPolicy::Warn,
        )?;
        if !report.is_clean() {
            warn!(keys = ?report.unused_leaf_pointers, "config keys not read by the CLI");
        }
        let config = &loaded.config_json;

        let base = api_url
            .map(str::to_string)
            .or_else(|| env_value(API_URL_ENV))
            .or_else(|| config_str(config, "/cli/api_url"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let token_env = token_env
            .map(str::to_string)
            .or_else(|| config_str(config, "/cli/token_env"))
            .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());
        let key = env_value(&token_env)
            .ok_or_else(|| anyhow!("SECRETS_MISSING: env var {token_env} is not set"))?;

        Self::new(&base, key)
    }

    pub fn new(base: &str, key: String) -> Result<Self> {
        Url::parse(base).with_context(|| format!("invalid api url '{base}'"))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("http client build failed")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            key,
        })
    }

    pub fn endpoint(&self, command: &str, kind: Kind, name: Option<&str>) -> String {
        match name {
            Some(n) => format!("{}/api/v1/cli/{command}/{}/{n}", self.base, kind.slug()),
            None => format!("{}/api/v1/cli/{command}/{}", self.base, kind.slug()),
        }
    }

    /// `sam apply -f FILE`. The manifest is validated locally first so an
    /// obviously broken file never leaves the machine.
    pub async fn apply(&self, file: &str) -> Result<()> {
        let text = read_manifest_file(file)?;
        let loaded = ManifestLoader::new()
            .load_str(&text)
            .with_context(|| format!("INVALID_MANIFEST file={file}"))?;
        let content_type = match loaded.format {
            ManifestFormat::Json => "application/json",
            ManifestFormat::Yaml => "application/yaml",
        };
        let url = self.endpoint("apply", loaded.manifest.kind(), None);
        self.send(
            self.http
                .post(url)
                .header(CONTENT_TYPE, content_type)
                .body(text),
        )
        .await
    }

    /// `sam get KIND [--name N]`
    pub async fn get(&self, kind: &str, name: Option<&str>) -> Result<()> {
        let url = self.endpoint("get", parse_kind(kind)?, None);
        let url = match name {
            Some(n) => Url::parse_with_params(&url, &[("name", n)])?,
            None => Url::parse(&url)?,
        };
        self.send(self.http.get(url)).await
    }

    /// describe, delete, deploy, undeploy and logs.
    pub async fn named(&self, command: &str, kind: &str, name: &str) -> Result<()> {
        let url = self.endpoint(command, parse_kind(kind)?, Some(name));
        let req = match command {
            "describe" | "logs" => self.http.get(url),
            _ => self.http.post(url),
        };
        self.send(req).await
    }

    /// `sam chat NAME --prompt P`
    pub async fn chat(&self, name: &str, prompt: &str) -> Result<()> {
        let url = self.endpoint("chat", Kind::Chat, Some(name));
        self.send(self.http.post(url).json(&json!({ "prompt": prompt })))
            .await
    }

    async fn send(&self, req: RequestBuilder) -> Result<()> {
        let resp = req
            .header(AUTHORIZATION, format!("Token {}", self.key))
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.base))?;
        let status = resp.status();
        let body = resp.text().await.context("response body read failed")?;

        let envelope: Option<Value> = serde_json::from_str(&body).ok();
        match &envelope {
            Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
            None => {
                warn!(%status, "daemon answered without an envelope");
                println!("{body}");
            }
        }

        if !status.is_success() {
            let class = envelope
                .as_ref()
                .and_then(|v| v.pointer("/error/errorClass"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            bail!("REQUEST_FAILED status={} class={}", status.as_u16(), class);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_use_slugs_and_ignore_trailing_slash() {
        let c = ApiClient::new("http://localhost:8899/", "k".into()).unwrap();
        assert_eq!(
            c.endpoint("describe", Kind::SqlConnection, Some("warehouse")),
            "http://localhost:8899/api/v1/cli/describe/sqlconnection/warehouse"
        );
        assert_eq!(
            c.endpoint("get", Kind::User, None),
            "http://localhost:8899/api/v1/cli/get/user"
        );
    }

    #[test]
    fn debug_redacts_the_key() {
        let c = ApiClient::new("http://localhost:8899", "super-secret".into()).unwrap();
        assert!(!format!("{c:?}").contains("super-secret"));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(ApiClient::new("not a url", "k".into()).is_err());
    }
}
