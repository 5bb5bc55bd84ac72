//! Manifest loader: raw YAML/JSON text into a validated [`Manifest`].
//!
//! Loading is strict. The document must be a mapping, must carry the four
//! top-level keys `apiVersion`, `kind`, `metadata` and `spec` (checked in
//! that order), and must then pass the schema layer. There is no lenient
//! mode.

use std::fmt;
use std::path::{Path, PathBuf};

use sam_schemas::{Kind, Manifest, SchemaError, API_VERSION};
use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level keys every manifest must carry, in check order.
pub const REQUIRED_KEYS: [&str; 4] = ["apiVersion", "kind", "metadata", "spec"];

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("unsupported manifest format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required key {0}")]
    MissingKey(&'static str),

    #[error("expected a {expected} manifest but got kind '{found}'")]
    KindMismatch { expected: Kind, found: String },

    #[error("expected apiVersion '{expected}' but got '{found}'")]
    ApiVersionMismatch { expected: String, found: String },

    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Serialization the manifest text arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestFormat::Json => f.write_str("json"),
            ManifestFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub format: ManifestFormat,
}

/// Loader with optional fail-fast expectations.
///
/// ```ignore
/// let loaded = ManifestLoader::new().expect_kind(Kind::User).load_str(text)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    expected_kind: Option<Kind>,
    expected_api_version: Option<String>,
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_kind(mut self, kind: Kind) -> Self {
        self.expected_kind = Some(kind);
        self
    }

    pub fn expect_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.expected_api_version = Some(api_version.into());
        self
    }

    pub fn load_str(&self, text: &str) -> LoaderResult<LoadedManifest> {
        let (doc, format) = parse_document(text)?;
        let manifest = self.load_map(doc)?;
        tracing::debug!(kind = %manifest.kind(), name = manifest.name(), %format, "manifest loaded");
        Ok(LoadedManifest { manifest, format })
    }

    /// Load from an already-parsed JSON value.
    pub fn load_value(&self, value: Value) -> LoaderResult<Manifest> {
        match value {
            Value::Object(map) => self.load_map(map),
            other => Err(LoaderError::UnsupportedFormat(format!(
                "manifest must be a mapping, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> LoaderResult<LoadedManifest> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text)
    }

    fn load_map(&self, mut doc: Map<String, Value>) -> LoaderResult<Manifest> {
        for key in REQUIRED_KEYS {
            if doc.get(key).map_or(true, Value::is_null) {
                return Err(LoaderError::MissingKey(key));
            }
        }

        let api_version = string_key(&doc, "apiVersion")?;
        let kind = string_key(&doc, "kind")?;

        let expected_api = self.expected_api_version.as_deref().unwrap_or(API_VERSION);
        if api_version != expected_api {
            return Err(LoaderError::ApiVersionMismatch {
                expected: expected_api.to_string(),
                found: api_version,
            });
        }
        if let Some(expected) = self.expected_kind {
            if kind != expected.as_str() {
                return Err(LoaderError::KindMismatch {
                    expected,
                    found: kind,
                });
            }
        }

        let metadata = doc.remove("metadata").unwrap_or(Value::Null);
        let spec = doc.remove("spec").unwrap_or(Value::Null);
        let status = doc.remove("status");
        doc.remove("apiVersion");
        doc.remove("kind");
        if let Some(extra) = doc.keys().next() {
            return Err(SchemaError::field(extra.clone(), "is not a recognised top-level key").into());
        }

        Ok(Manifest::from_parts(&api_version, &kind, metadata, spec, status)?)
    }
}

/// Load with default expectations.
pub fn load_str(text: &str) -> LoaderResult<LoadedManifest> {
    ManifestLoader::new().load_str(text)
}

/// Detect the text's format and parse it into a top-level mapping.
pub fn parse_document(text: &str) -> LoaderResult<(Map<String, Value>, ManifestFormat)> {
    if text.trim().is_empty() {
        return Err(LoaderError::UnsupportedFormat("manifest is empty".into()));
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok((map, ManifestFormat::Json));
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
        LoaderError::UnsupportedFormat(format!("neither a JSON object nor valid YAML: {e}"))
    })?;
    if !yaml.is_mapping() {
        return Err(LoaderError::UnsupportedFormat(
            "manifest must be a YAML mapping or JSON object".into(),
        ));
    }
    match serde_json::to_value(yaml) {
        Ok(Value::Object(map)) => Ok((map, ManifestFormat::Yaml)),
        Ok(_) => Err(LoaderError::UnsupportedFormat(
            "manifest must be a YAML mapping or JSON object".into(),
        )),
        Err(e) => Err(LoaderError::UnsupportedFormat(format!(
            "YAML document cannot be represented as JSON: {e}"
        ))),
    }
}

fn string_key(doc: &Map<String, Value>, key: &'static str) -> LoaderResult<String> {
    match doc.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SchemaError::field(
            key,
            format!("must be a string, got {}", type_name(other)),
        )
        .into()),
        None => Err(LoaderError::MissingKey(key)),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
