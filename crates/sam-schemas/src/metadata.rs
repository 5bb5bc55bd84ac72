//! `metadata` section shared by every kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validators::{require_non_empty, validate_name, validate_semver, validate_tag};
use crate::{SchemaError, SchemaResult};

/// Identity and bookkeeping for a manifest.
///
/// `name` is the resource's stable identifier within its `(account, kind)`
/// scope. Fields are private: a `Metadata` can only come out of
/// [`Metadata::new`] or deserialization, both of which validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata")]
pub struct Metadata {
    name: String,
    description: String,
    version: String,
    tags: Vec<String>,
    annotations: Vec<String>,
}

/// Unvalidated wire shape; only ever converted through `TryFrom`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawMetadata {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    annotations: Vec<String>,
}

impl Metadata {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        tags: Vec<String>,
        annotations: Vec<String>,
    ) -> SchemaResult<Self> {
        let md = Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            tags,
            annotations,
        };
        md.validate()?;
        Ok(md)
    }

    /// Parse the `metadata` object of a manifest document.
    pub fn from_value(value: Value) -> SchemaResult<Self> {
        if !value.is_object() {
            return Err(SchemaError::field("metadata", "must be a mapping"));
        }
        let raw: RawMetadata = serde_json::from_value(value)
            .map_err(|e| SchemaError::field("metadata", e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    fn validate(&self) -> SchemaResult<()> {
        validate_name("metadata.name", &self.name)?;
        require_non_empty("metadata.description", &self.description)?;
        validate_semver("metadata.version", &self.version)?;
        for (i, tag) in self.tags.iter().enumerate() {
            validate_tag(&format!("metadata.tags[{i}]"), tag)?;
        }
        for (i, annotation) in self.annotations.iter().enumerate() {
            validate_tag(&format!("metadata.annotations[{i}]"), annotation)?;
        }
        Ok(())
    }
}

impl TryFrom<RawMetadata> for Metadata {
    type Error = SchemaError;

    fn try_from(raw: RawMetadata) -> Result<Self, Self::Error> {
        let name = raw
            .name
            .ok_or_else(|| SchemaError::field("metadata.name", "is required"))?;
        let description = raw
            .description
            .ok_or_else(|| SchemaError::field("metadata.description", "is required"))?;
        let version = raw
            .version
            .ok_or_else(|| SchemaError::field("metadata.version", "is required"))?;
        Metadata::new(name, description, version, raw.tags, raw.annotations)
    }
}
