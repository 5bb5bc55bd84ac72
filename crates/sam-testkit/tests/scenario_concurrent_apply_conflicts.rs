//! Scenario: concurrent writers are serialised by revision.
//!
//! # Invariants under test
//!
//! 1. When another writer updates a row between read and write, the apply
//!    fails with `Conflict` (409) instead of overwriting.
//! 2. The competing edit is what remains stored.
//! 3. Retrying the apply afterwards succeeds.

use std::sync::Arc;

use sam_broker::SamError;
use sam_loader::ManifestLoader;
use sam_testkit::{fixture_manifest, ContendedStore, Harness, ACCOUNT};
use serde_json::json;

#[tokio::test]
async fn lost_update_is_reported_as_conflict() {
    let store = Arc::new(ContendedStore::new());
    let h = Harness::with_store(store.clone());
    let user = fixture_manifest("user").unwrap();
    h.apply(&user).await.unwrap();

    let mut doc = user.to_value();
    doc["spec"]["config"]["firstName"] = json!("Janet");
    let edited = ManifestLoader::new().load_value(doc).unwrap();

    store.arm();
    let err = h.apply(&edited).await.unwrap_err();
    let err = err.downcast::<SamError>().unwrap();
    assert_eq!(err.class(), "Conflict");
    assert_eq!(err.status_code(), 409);

    let stored = h.store.fetch(ACCOUNT, "User", "jdoe").await.unwrap().unwrap();
    assert!(stored.description.ends_with("(concurrent edit)"));
    assert_eq!(stored.field_str("first_name"), Some("Jane"));

    let out = h.apply(&edited).await.unwrap();
    assert_eq!(out.spec_value()["config"]["firstName"], json!("Janet"));
}
