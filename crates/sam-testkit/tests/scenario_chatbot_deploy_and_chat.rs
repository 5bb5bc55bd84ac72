//! Scenario: a chatbot is deployed, chatted with, and undeployed.
//!
//! # Invariants under test
//!
//! 1. Chat against an undeployed chatbot is `NotReady`.
//! 2. Deploy submits exactly one provisioning task carrying the default host
//!    and the custom domain, and is idempotent.
//! 3. Chat passes the chatbot's model settings and plugin names to the
//!    pipeline and records the exchange on the chat log kinds.
//! 4. Deploy with no provisioning consumer is `NotReady` and changes nothing.
//! 5. A pipeline failure surfaces as an internal error and records nothing.

use std::sync::Arc;

use sam_broker::{Kind, ProvisioningAction};
use sam_testkit::{Harness, ScriptedPipeline, ACCOUNT};
use serde_json::json;

#[tokio::test]
async fn deploy_chat_undeploy() {
    let pipeline = Arc::new(
        ScriptedPipeline::answering("Order 1042 shipped yesterday.")
            .with_tool_call(json!({"name": "order_lookup", "arguments": {"customer": "jdoe"}})),
    );
    let mut h = Harness::new().with_pipeline(pipeline.clone());
    h.seed_through("chat").await.unwrap();

    let mut chats = h.broker(Kind::Chat).unwrap();
    let err = chats.chat("order_desk_session", "where is 1042?").await.unwrap_err();
    assert_eq!(err.class(), "NotReady");

    let mut bots = h.broker(Kind::Chatbot).unwrap();
    let deployed = bots.deploy("order_desk").await.unwrap();
    assert_eq!(deployed.status().unwrap()["deployed"], json!(true));
    assert_eq!(
        deployed.status().unwrap()["url"],
        json!("https://orders.example.com/")
    );
    bots.deploy("order_desk").await.unwrap();

    let tasks = h.drain_tasks();
    assert_eq!(tasks.len(), 1, "second deploy must not resubmit");
    assert_eq!(tasks[0].action, ProvisioningAction::Deploy);
    assert_eq!(
        tasks[0].hosts,
        vec![
            "order-desk.acme.smarter.sh".to_string(),
            "orders.example.com".to_string()
        ]
    );

    let mut chats = h.broker(Kind::Chat).unwrap();
    let reply = chats
        .chat("order_desk_session", "where is 1042?")
        .await
        .unwrap();
    assert_eq!(reply["response"], json!("Order 1042 shipped yesterday."));

    let seen = pipeline.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].model, "gpt-4o-mini");
    assert_eq!(seen[0].max_tokens, 512);
    assert_eq!(seen[0].plugins, vec!["order_lookup".to_string()]);

    for kind in [Kind::ChatHistory, Kind::ChatPluginUsage, Kind::ChatToolCall] {
        let mut logs = h.broker(kind).unwrap();
        let m = logs.describe("order_desk_session").await.unwrap();
        assert_eq!(m.status().unwrap()["recordCount"], json!(1), "{kind}");
    }

    let undeployed = bots.undeploy("order_desk").await.unwrap();
    assert_eq!(undeployed.status().unwrap()["deployed"], json!(false));
    let tasks = h.drain_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].action, ProvisioningAction::Undeploy);

    let lifecycle = bots.logs("order_desk").await.unwrap();
    let messages: Vec<&str> = lifecycle.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, ["deployed", "undeployed"]);
}

#[tokio::test]
async fn deploy_without_provisioner_changes_nothing() {
    let mut h = Harness::new();
    h.seed_through("chatbot").await.unwrap();
    h.close_provisioning();

    let mut bots = h.broker(Kind::Chatbot).unwrap();
    let err = bots.deploy("order_desk").await.unwrap_err();
    assert_eq!(err.class(), "NotReady");
    assert_eq!(err.status_code(), 412);

    let stored = h
        .store
        .fetch(ACCOUNT, "Chatbot", "order_desk")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.field_bool("deployed"), None);
}

#[tokio::test]
async fn pipeline_failure_is_internal_and_unrecorded() {
    let h = Harness::new().with_pipeline(Arc::new(ScriptedPipeline::failing()));
    h.seed_through("chat").await.unwrap();
    h.broker(Kind::Chatbot)
        .unwrap()
        .deploy("order_desk")
        .await
        .unwrap();

    let mut chats = h.broker(Kind::Chat).unwrap();
    let err = chats.chat("order_desk_session", "hello").await.unwrap_err();
    assert_eq!(err.class(), "InternalError");
    assert!(h
        .store
        .logs(ACCOUNT, "ChatHistory", "order_desk_session", 10)
        .await
        .unwrap()
        .is_empty());
}
