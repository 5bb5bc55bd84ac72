//! Scenario: malformed or misdirected manifests never reach the store.
//!
//! # Invariants under test
//!
//! 1. A manifest applied to a broker of a different kind is a business-rule
//!    violation and writes nothing.
//! 2. An unknown kind name is `UnsupportedKind` and lists the known kinds.
//! 3. A manifest carrying a non-null `status` is a validation error.
//! 4. A reference to a missing entity is a validation error naming the field.
//! 5. Log kinds refuse writes with `ReadOnly`.

use sam_broker::{registry, Kind, SamError};
use sam_loader::ManifestLoader;
use sam_testkit::{fixture_manifest, Harness, ACCOUNT};
use serde_json::json;

#[tokio::test]
async fn kind_mismatch_writes_nothing() {
    let h = Harness::new();
    let user = fixture_manifest("user").unwrap();
    let mut secrets = h.broker(Kind::Secret).unwrap();
    let err = secrets.apply(&user).await.unwrap_err();
    assert_eq!(err.class(), "BusinessRuleViolation", "{err}");
    assert!(h.store.list(ACCOUNT, "User", None).await.unwrap().is_empty());
    assert!(h.store.list(ACCOUNT, "Secret", None).await.unwrap().is_empty());
}

#[test]
fn unknown_kind_lists_known_kinds() {
    let err = registry::global().resolve("Robot").unwrap_err();
    match &err {
        SamError::UnsupportedKind { kind, known } => {
            assert_eq!(kind, "Robot");
            assert_eq!(known.len(), Kind::ALL.len());
        }
        other => panic!("expected UnsupportedKind, got {other:?}"),
    }
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn client_supplied_status_is_rejected() {
    let h = Harness::new();
    let mut doc = fixture_manifest("user").unwrap().to_value();
    doc["status"] = json!({"created": "2024-01-01T00:00:00Z"});
    let manifest = ManifestLoader::new().load_value(doc).unwrap();

    let err = h.apply(&manifest).await.unwrap_err();
    let err = err.downcast::<SamError>().unwrap();
    assert_eq!(err.class(), "ValidationError");
    assert!(err.to_string().starts_with("status.created"), "{err}");
}

#[tokio::test]
async fn dangling_reference_names_the_field() {
    let h = Harness::new();
    let err = h.apply_fixture("sql_connection").await.unwrap_err();
    let err = err.downcast::<SamError>().unwrap();
    assert_eq!(err.class(), "ValidationError");
    assert_eq!(
        err.to_string(),
        "spec.connection.password: Secret 'warehouse_password' does not exist"
    );
}

#[tokio::test]
async fn chat_logs_are_read_only() {
    let h = Harness::new();
    for kind in [Kind::ChatHistory, Kind::ChatPluginUsage, Kind::ChatToolCall] {
        let mut broker = h.broker(kind).unwrap();
        let example = broker.example_manifest().unwrap();
        let err = broker.apply(&example).await.unwrap_err();
        assert!(matches!(err, SamError::ReadOnly { .. }), "{kind}: {err}");
        let err = broker.delete("anything").await.unwrap_err();
        assert!(matches!(err, SamError::ReadOnly { .. }), "{kind}: {err}");
    }
}
