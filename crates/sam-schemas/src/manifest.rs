//! The top-level manifest document.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Kind, KindSpec, Metadata, SchemaError, SchemaResult};

/// The only `apiVersion` this crate accepts.
pub const API_VERSION: &str = "smarter.sh/v1";

/// A validated, immutable manifest.
///
/// `status` is server-computed. It is carried so that brokers can return it
/// on `describe`/`get`, but it never influences what is persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    api_version: String,
    kind: Kind,
    metadata: Metadata,
    spec: KindSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Value>,
}

impl Manifest {
    /// Build a manifest from already-typed parts. `spec` is revalidated so a
    /// spec struct edited after parsing cannot slip through.
    pub fn new(kind: Kind, metadata: Metadata, spec: KindSpec) -> SchemaResult<Self> {
        if spec.kind() != kind {
            return Err(SchemaError::KindMismatch {
                expected: kind,
                found: spec.kind(),
            });
        }
        spec.validate()?;
        Ok(Self {
            api_version: API_VERSION.to_string(),
            kind,
            metadata,
            spec,
            status: None,
        })
    }

    /// Build a manifest from the raw top-level values of a document.
    pub fn from_parts(
        api_version: &str,
        kind: &str,
        metadata: Value,
        spec: Value,
        status: Option<Value>,
    ) -> SchemaResult<Self> {
        if api_version != API_VERSION {
            return Err(SchemaError::ApiVersion {
                expected: API_VERSION,
                found: api_version.to_string(),
            });
        }
        let kind = Kind::parse(kind)?;
        let metadata = Metadata::from_value(metadata)?;
        let spec = KindSpec::parse(kind, spec)?;
        let mut manifest = Self::new(kind, metadata, spec)?;
        manifest.status = status.filter(|s| !s.is_null());
        Ok(manifest)
    }

    /// A copy carrying a server-computed `status`.
    pub fn with_status(&self, status: Value) -> Self {
        Self {
            status: Some(status),
            ..self.clone()
        }
    }

    pub fn without_status(&self) -> Self {
        Self {
            status: None,
            ..self.clone()
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn spec(&self) -> &KindSpec {
        &self.spec
    }

    pub fn spec_value(&self) -> Value {
        self.spec.to_value()
    }

    pub fn status(&self) -> Option<&Value> {
        self.status.as_ref()
    }

    /// Dotted paths (`status.deployed`) of every non-null leaf in `status`.
    ///
    /// An absent status, an empty object and an object of nulls all yield
    /// nothing.
    pub fn non_null_status_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(status) = &self.status {
            collect_non_null("status", status, &mut out);
        }
        out
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("apiVersion".into(), Value::String(self.api_version.clone()));
        obj.insert("kind".into(), Value::String(self.kind.as_str().into()));
        obj.insert(
            "metadata".into(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        obj.insert("spec".into(), self.spec.to_value());
        if let Some(status) = &self.status {
            obj.insert("status".into(), status.clone());
        }
        Value::Object(obj)
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_value()).unwrap_or_default()
    }
}

fn collect_non_null(path: &str, v: &Value, out: &mut Vec<String>) {
    match v {
        Value::Null => {}
        Value::Object(map) => {
            for (k, child) in map {
                collect_non_null(&format!("{path}.{k}"), child, out);
            }
        }
        _ => out.push(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user_parts() -> (Value, Value) {
        (
            json!({"name": "example_user", "description": "an example user", "version": "1.0.0"}),
            json!({"config": {"firstName": "John", "lastName": "Doe", "email": "joe@mail.com"}}),
        )
    }

    #[test]
    fn from_parts_builds_a_user() {
        let (md, spec) = user_parts();
        let m = Manifest::from_parts(API_VERSION, "User", md, spec, None).unwrap();
        assert_eq!(m.kind(), Kind::User);
        assert_eq!(m.name(), "example_user");
        assert_eq!(m.api_version(), API_VERSION);
        assert!(m.status().is_none());
    }

    #[test]
    fn wrong_api_version_is_rejected() {
        let (md, spec) = user_parts();
        let err = Manifest::from_parts("smarter.sh/v0", "User", md, spec, None).unwrap_err();
        assert!(matches!(err, SchemaError::ApiVersion { .. }));
    }

    #[test]
    fn kind_must_match_spec() {
        let (md, spec) = user_parts();
        let metadata = Metadata::from_value(md).unwrap();
        let spec = KindSpec::parse(Kind::User, spec).unwrap();
        let err = Manifest::new(Kind::Account, metadata, spec).unwrap_err();
        assert_eq!(
            err,
            SchemaError::KindMismatch {
                expected: Kind::Account,
                found: Kind::User
            }
        );
    }

    #[test]
    fn to_value_uses_camel_case_keys() {
        let (md, spec) = user_parts();
        let m = Manifest::from_parts(API_VERSION, "User", md, spec.clone(), None).unwrap();
        let v = m.to_value();
        assert_eq!(v["apiVersion"], json!(API_VERSION));
        assert_eq!(v["kind"], json!("User"));
        assert_eq!(v["spec"]["config"]["firstName"], spec["config"]["firstName"]);
        assert!(v.get("status").is_none());
    }

    #[test]
    fn null_status_fields_are_ignored() {
        let (md, spec) = user_parts();
        let m = Manifest::from_parts(
            API_VERSION,
            "User",
            md,
            spec,
            Some(json!({"created": null, "nested": {"modified": null}})),
        )
        .unwrap();
        assert!(m.non_null_status_fields().is_empty());

        let m = m.with_status(json!({"created": "2024-01-01T00:00:00Z", "deployed": null}));
        assert_eq!(m.non_null_status_fields(), vec!["status.created".to_string()]);
        assert!(m.without_status().status().is_none());
    }
}
