//! Scenario: deletion order follows the reference graph.
//!
//! # Invariants under test
//!
//! 1. An entity referenced by another cannot be deleted.
//! 2. Deleting in reverse dependency order succeeds, and each deleted entity
//!    then describes as `NotFound`.
//! 3. A user cannot delete themselves.

use sam_broker::{Kind, SamError};
use sam_testkit::{fixture_manifest, Harness, FIXTURE_CHAIN};

#[tokio::test]
async fn referenced_entities_survive_delete_attempts() {
    let h = Harness::new();
    h.seed_through("chat").await.unwrap();

    let mut secrets = h.broker(Kind::Secret).unwrap();
    let err = secrets.delete("warehouse_password").await.unwrap_err();
    assert_eq!(err.class(), "BusinessRuleViolation");
    assert!(err.to_string().contains("SqlConnection 'warehouse'"), "{err}");

    let mut bots = h.broker(Kind::Chatbot).unwrap();
    let err = bots.delete("order_desk").await.unwrap_err();
    assert!(err.to_string().contains("Chat 'order_desk_session'"), "{err}");
}

#[tokio::test]
async fn reverse_order_delete_then_describe_is_not_found() {
    let h = Harness::new();
    h.seed_through("chat").await.unwrap();

    for name in FIXTURE_CHAIN.iter().rev() {
        let manifest = fixture_manifest(name).unwrap();
        let mut broker = h.broker(manifest.kind()).unwrap();
        broker.delete(manifest.name()).await.unwrap();

        let err = broker.describe(manifest.name()).await.unwrap_err();
        assert!(matches!(err, SamError::NotFound { .. }), "{name}: {err}");
    }
}

#[tokio::test]
async fn users_cannot_delete_themselves() {
    let h = Harness::new();
    h.apply_fixture("user").await.unwrap();

    let ctx = h.as_user("jdoe", true);
    let mut users = sam_broker::registry::global()
        .instantiate(Kind::User, ctx)
        .unwrap();
    let err = users.delete("jdoe").await.unwrap_err();
    assert_eq!(err.class(), "BusinessRuleViolation");
}
