//! Scenario: apply -> describe returns the manifest that was applied.
//!
//! # Invariants under test
//!
//! 1. Describe after apply yields the same apiVersion, kind, metadata and spec,
//!    plus server-computed status.
//! 2. References travel as names on the wire even though they are stored as ids.
//! 3. Re-applying an unchanged manifest does not bump the stored revision.
//! 4. Changing one field and re-applying updates in place.
//! 5. Every persisted kind's example manifest survives apply -> describe,
//!    references included.

use pretty_assertions::assert_eq;
use sam_broker::{registry, Kind};
use sam_schemas::KindFamily;
use sam_testkit::{fixture_manifest, Harness, ACCOUNT, FIXTURE_CHAIN};
use serde_json::json;

/// Every kind with entities of its own, ordered so that each example's
/// references (by name) point at an example applied earlier.
const PERSISTED_KINDS: [Kind; 11] = [
    Kind::Account,
    Kind::User,
    Kind::Secret,
    Kind::AuthToken,
    Kind::SqlConnection,
    Kind::ApiConnection,
    Kind::StaticPlugin,
    Kind::SqlPlugin,
    Kind::ApiPlugin,
    Kind::Chatbot,
    Kind::Chat,
];

#[test]
fn persisted_kind_list_is_complete() {
    let mut expected: Vec<Kind> = registry::global()
        .known_kinds()
        .into_iter()
        .filter(|k| k.family() != KindFamily::ChatLog)
        .collect();
    let mut listed = PERSISTED_KINDS.to_vec();
    expected.sort_by_key(|k| k.as_str());
    listed.sort_by_key(|k| k.as_str());
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn every_example_manifest_describes_back_to_itself() {
    let h = Harness::new();
    for kind in PERSISTED_KINDS {
        let applied = registry::global().example_manifest(kind).unwrap();
        h.apply(&applied).await.unwrap();

        let described = h.broker(kind).unwrap().describe(applied.name()).await.unwrap();
        assert_eq!(described.kind(), kind);
        assert_eq!(described.metadata(), applied.metadata(), "{kind}");
        let mut expected = applied.spec_value();
        if kind == Kind::Secret {
            expected["config"]["value"] = json!("******");
        }
        assert_eq!(described.spec_value(), expected, "{kind}");
        let status = described.status().expect("status is always computed");
        assert!(status["created"].is_string(), "{kind}");
        assert!(status["modified"].is_string(), "{kind}");
    }
}

#[tokio::test]
async fn example_user_apply_then_describe() {
    let h = Harness::new();
    let config = json!({
        "firstName": "John",
        "lastName": "Doe",
        "email": "joe@mail.com",
        "isActive": true,
        "isStaff": false
    });
    let manifest = sam_loader::ManifestLoader::new()
        .load_value(json!({
            "apiVersion": "smarter.sh/v1",
            "kind": "User",
            "metadata": {
                "name": "example_user",
                "description": "an example user",
                "version": "1.0.0"
            },
            "spec": {"config": config.clone()}
        }))
        .unwrap();
    h.apply(&manifest).await.unwrap();

    let described = h
        .broker(Kind::User)
        .unwrap()
        .describe("example_user")
        .await
        .unwrap();
    assert_eq!(described.spec_value()["config"], config);
    let status = described.status().unwrap();
    assert!(!status["created"].is_null());
    assert!(!status["modified"].is_null());
}

#[tokio::test]
async fn every_fixture_describes_back_to_itself() {
    let h = Harness::new();
    for name in FIXTURE_CHAIN {
        let applied = fixture_manifest(name).unwrap();
        h.apply(&applied).await.unwrap();

        let mut broker = h.broker(applied.kind()).unwrap();
        let described = broker.describe(applied.name()).await.unwrap();
        assert_eq!(described.api_version(), applied.api_version(), "{name}");
        assert_eq!(described.metadata(), applied.metadata(), "{name}");
        if applied.kind() == Kind::Secret {
            assert_eq!(described.spec_value()["config"]["value"], json!("******"));
        } else {
            assert_eq!(described.spec_value(), applied.spec_value(), "{name}");
        }
        let status = described.status().expect("status is always computed");
        assert!(status.get("created").is_some(), "{name}");
        assert!(status.get("modified").is_some(), "{name}");
    }
}

#[tokio::test]
async fn references_are_stored_as_ids_and_rendered_as_names() {
    let h = Harness::new();
    h.seed_through("sql_connection").await.unwrap();

    let secret = h
        .store
        .fetch(ACCOUNT, "Secret", "warehouse_password")
        .await
        .unwrap()
        .unwrap();
    let conn = h
        .store
        .fetch(ACCOUNT, "SqlConnection", "warehouse")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conn.field_str("password_id"), Some(secret.id.to_string().as_str()));

    let described = h
        .broker(Kind::SqlConnection)
        .unwrap()
        .describe("warehouse")
        .await
        .unwrap();
    assert_eq!(
        described.spec_value()["connection"]["password"],
        json!("warehouse_password")
    );
}

#[tokio::test]
async fn unchanged_reapply_is_a_no_op_and_changes_update_in_place() {
    let h = Harness::new();
    let user = fixture_manifest("user").unwrap();
    h.apply(&user).await.unwrap();
    let first = h.store.fetch(ACCOUNT, "User", "jdoe").await.unwrap().unwrap();

    h.apply(&user).await.unwrap();
    let second = h.store.fetch(ACCOUNT, "User", "jdoe").await.unwrap().unwrap();
    assert_eq!(second.revision, first.revision, "identical apply must not write");

    let mut doc = user.to_value();
    doc["spec"]["config"]["lastName"] = json!("Roe");
    let edited = sam_loader::ManifestLoader::new().load_value(doc).unwrap();
    let out = h.apply(&edited).await.unwrap();
    assert_eq!(out.spec_value()["config"]["lastName"], json!("Roe"));

    let third = h.store.fetch(ACCOUNT, "User", "jdoe").await.unwrap().unwrap();
    assert_eq!(third.id, first.id, "update keeps identity");
    assert_eq!(third.revision, first.revision + 1);
}
