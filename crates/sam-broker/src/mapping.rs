//! Declared field mappings between manifest specs and entity columns.
//!
//! A manifest spec is nested camelCase (`/connection/baseUrl`); an entity
//! stores flat snake_case columns (`base_url`). Each kind declares one
//! [`FieldMapping`] per spec subtree it persists. A mapping's pointer covers
//! everything below it, so list- or object-valued fields (`/plugins`,
//! `/data/staticData`) map to a single column holding the whole value.
//!
//! [`FieldMap::flatten`] fails if the spec carries a leaf that no mapping
//! covers; nothing in a spec is silently dropped on the way to the store.

use std::collections::BTreeSet;

use sam_schemas::{Kind, KindFamily};
use serde_json::{Map, Value};

use crate::{SamError, SamResult};

/// What a reference column points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget {
    Kind(Kind),
    /// Any of the plugin kinds.
    Plugin,
}

impl RefTarget {
    pub fn matches(&self, kind: Kind) -> bool {
        match self {
            RefTarget::Kind(k) => *k == kind,
            RefTarget::Plugin => kind.family() == KindFamily::Plugin,
        }
    }

    /// Kinds a name may resolve to, in lookup order.
    pub fn candidates(&self) -> Vec<Kind> {
        match self {
            RefTarget::Kind(k) => vec![*k],
            RefTarget::Plugin => Kind::ALL
                .into_iter()
                .filter(|k| k.family() == KindFamily::Plugin)
                .collect(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RefTarget::Kind(k) => k.to_string(),
            RefTarget::Plugin => "plugin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    /// JSON pointer into the manifest `spec`.
    pub pointer: &'static str,
    /// Entity column name.
    pub column: &'static str,
    /// Set when the spec holds a name (or list of names) of another entity;
    /// the column then holds the referenced id(s).
    pub reference: Option<RefTarget>,
}

impl FieldMapping {
    pub const fn new(pointer: &'static str, column: &'static str) -> Self {
        Self {
            pointer,
            column,
            reference: None,
        }
    }

    pub const fn reference(pointer: &'static str, column: &'static str, target: RefTarget) -> Self {
        Self {
            pointer,
            column,
            reference: Some(target),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldMap {
    kind: Kind,
    mappings: Vec<FieldMapping>,
}

impl FieldMap {
    /// Panics on duplicate columns or overlapping pointers: tables are static
    /// and a bad one is a programming error caught by the first test that
    /// touches the kind.
    pub fn new(kind: Kind, mappings: Vec<FieldMapping>) -> Self {
        let mut columns = BTreeSet::new();
        for (i, m) in mappings.iter().enumerate() {
            assert!(columns.insert(m.column), "{kind}: duplicate column {}", m.column);
            for other in &mappings[..i] {
                assert!(
                    !is_prefix_pointer(other.pointer, m.pointer)
                        && !is_prefix_pointer(m.pointer, other.pointer),
                    "{kind}: pointers {} and {} overlap",
                    other.pointer,
                    m.pointer
                );
            }
        }
        Self { kind, mappings }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn references(&self) -> impl Iterator<Item = (&FieldMapping, RefTarget)> {
        self.mappings
            .iter()
            .filter_map(|m| m.reference.map(|target| (m, target)))
    }

    pub fn is_mapped_column(&self, column: &str) -> bool {
        self.mappings.iter().any(|m| m.column == column)
    }

    /// Spec value -> column map. Absent optional fields become absent columns.
    pub fn flatten(&self, spec: &Value) -> SamResult<Map<String, Value>> {
        let mut leaves = Vec::new();
        collect_leaf_pointers(spec, "", &mut leaves);
        if let Some(uncovered) = leaves
            .iter()
            .find(|leaf| !self.mappings.iter().any(|m| is_prefix_pointer(m.pointer, leaf)))
        {
            return Err(SamError::internal(format!(
                "{}: spec field {uncovered} has no column mapping",
                self.kind
            )));
        }

        let mut columns = Map::new();
        for m in &self.mappings {
            if let Some(v) = spec.pointer(m.pointer) {
                if !v.is_null() {
                    columns.insert(m.column.to_string(), v.clone());
                }
            }
        }
        Ok(columns)
    }

    /// Column map -> spec value. Columns not in the table are ignored.
    pub fn unflatten(&self, columns: &Map<String, Value>) -> Value {
        let mut spec = Value::Object(Map::new());
        for m in &self.mappings {
            if let Some(v) = columns.get(m.column) {
                if !v.is_null() {
                    set_pointer(&mut spec, m.pointer, v.clone());
                }
            }
        }
        spec
    }
}

/// camelCase -> snake_case for a single pointer token (`useSsl` -> `use_ssl`).
pub fn snake_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 4);
    for (i, c) in token.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Return true if `prefix` is a JSON-pointer prefix of `leaf`.
///
/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
pub fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix.is_empty() || prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix) && leaf[prefix.len()..].starts_with('/')
}

pub fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
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

fn unescape_pointer_token(s: &str) -> String {
    s.replace("~1", "/").replace("~0", "~")
}

/// Write `value` at `pointer`, creating intermediate objects.
fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    let tokens: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(unescape_pointer_token)
        .collect();
    let Some((last, parents)) = tokens.split_last() else {
        *root = value;
        return;
    };
    let mut cur = root;
    for t in parents {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        let Value::Object(map) = cur else { return };
        cur = map.entry(t.clone()).or_insert_with(|| Value::Object(Map::new()));
    }
    if !cur.is_object() {
        *cur = Value::Object(Map::new());
    }
    if let Value::Object(map) = cur {
        map.insert(last.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_map() -> FieldMap {
        FieldMap::new(
            Kind::SqlConnection,
            vec![
                FieldMapping::new("/connection/dbEngine", "db_engine"),
                FieldMapping::new("/connection/useSsl", "use_ssl"),
                FieldMapping::reference(
                    "/connection/password",
                    "password_id",
                    RefTarget::Kind(Kind::Secret),
                ),
                FieldMapping::new("/connection/tags", "tags"),
            ],
        )
    }

    #[test]
    fn flatten_then_unflatten_restores_the_spec() {
        let spec = json!({"connection": {
            "dbEngine": "postgresql",
            "useSsl": true,
            "password": "pw_secret",
            "tags": ["a", "b"]
        }});
        let map = sample_map();
        let cols = map.flatten(&spec).unwrap();
        assert_eq!(cols["use_ssl"], json!(true));
        assert_eq!(cols["tags"], json!(["a", "b"]));
        assert_eq!(map.unflatten(&cols), spec);
    }

    #[test]
    fn uncovered_leaf_is_an_error() {
        let spec = json!({"connection": {"dbEngine": "postgresql", "port": 5432}});
        let err = sample_map().flatten(&spec).unwrap_err();
        assert!(err.to_string().contains("/connection/port"), "{err}");
    }

    #[test]
    fn absent_optional_fields_stay_absent() {
        let map = sample_map();
        let cols = map.flatten(&json!({"connection": {"dbEngine": "mysql"}})).unwrap();
        assert_eq!(cols.len(), 1);
        assert_eq!(map.unflatten(&cols), json!({"connection": {"dbEngine": "mysql"}}));
    }

    #[test]
    fn prefix_respects_token_boundaries() {
        assert!(is_prefix_pointer("/a/b", "/a/b"));
        assert!(is_prefix_pointer("/a/b", "/a/b/0/c"));
        assert!(!is_prefix_pointer("/a/b", "/a/bc"));
    }

    #[test]
    fn snake_case_handles_common_shapes() {
        assert_eq!(snake_case("baseUrl"), "base_url");
        assert_eq!(snake_case("appInfoUrl"), "app_info_url");
        assert_eq!(snake_case("address1"), "address1");
    }

    #[test]
    #[should_panic(expected = "duplicate column")]
    fn duplicate_columns_are_rejected() {
        FieldMap::new(
            Kind::User,
            vec![
                FieldMapping::new("/config/a", "x"),
                FieldMapping::new("/config/b", "x"),
            ],
        );
    }

    #[test]
    fn plugin_target_matches_every_plugin_kind() {
        assert!(RefTarget::Plugin.matches(Kind::SqlPlugin));
        assert!(!RefTarget::Plugin.matches(Kind::Chatbot));
        assert_eq!(RefTarget::Plugin.candidates().len(), 3);
    }
}
