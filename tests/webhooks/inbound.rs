//! Inbound processor events: signature verification and chargebacks.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::crypto::sign_payload;
use paygate::error::msg;
use paygate::webhooks::receive_processor_event;

const PROCESSOR_WEBHOOK: &str = "/api/v1/webhooks/processor";

async fn post_raw(env: &TestEnv, body: &str, signature: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(PROCESSOR_WEBHOOK)
        .header("Content-Type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("X-WEBHOOK-SIGNATURE", sig);
    }
    let response = env
        .app()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn chargeback(merchant_id: &str, intent_id: &str) -> String {
    json!({
        "event_type": "chargeback.opened",
        "data": { "merchant_id": merchant_id, "payment_intent_id": intent_id, "reason": "fraudulent" },
    })
    .to_string()
}

#[tokio::test]
async fn test_chargeback_opens_dispute() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Disputed");
    let pi = create_test_intent(&env, &m, 5_000);

    let body = chargeback(m.id(), &pi.id);
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap();
    let (status, json) = post_raw(&env, &body, Some(&signature)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["event_type"], "chargeback.opened");
    assert_eq!(json["data"]["status"], "received");

    let intent = env.intent(&m, &pi.id);
    assert_eq!(intent.dispute_status, DisputeStatus::Open);
    // Payment status is untouched
    assert_eq!(intent.status, PaymentIntentStatus::Created);

    let conn = env.conn();
    let event = queries::get_webhook_event(&conn, json["data"]["id"].as_str().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(event.delivery_status, DeliveryStatus::Succeeded);
    assert_eq!(event.payload, body);
    assert_eq!(event.merchant_id.as_deref(), Some(m.id()));

    let logs = queries::list_audit_logs_for(&conn, "payment_intent", &pi.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "chargeback_opened");
    assert_eq!(logs[0].actor_type, ActorType::Processor);
    drop(conn);

    // Inbound events are never re-delivered
    assert!(env.queue.is_empty());
}

#[tokio::test]
async fn test_invalid_or_missing_signature_changes_nothing() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Forged");
    let pi = create_test_intent(&env, &m, 5_000);
    let body = chargeback(m.id(), &pi.id);

    let forged = sign_payload("not-the-secret", body.as_bytes()).unwrap();
    for signature in [Some(forged.as_str()), Some("deadbeef"), None] {
        let (status, json) = post_raw(&env, &body, signature).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "invalid_signature");
        assert_eq!(json["error"]["message"], msg::INVALID_SIGNATURE);
    }

    assert_eq!(env.count("webhook_events"), 0);
    assert_eq!(env.intent(&m, &pi.id).dispute_status, DisputeStatus::None);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Tampered");
    let pi = create_test_intent(&env, &m, 5_000);
    let body = chargeback(m.id(), &pi.id);
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap();

    let tampered = body.replace("fraudulent", "duplicate");
    let (status, _) = post_raw(&env, &tampered, Some(&signature)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(env.count("webhook_events"), 0);
}

#[tokio::test]
async fn test_signed_garbage_is_bad_request() {
    let env = TestEnv::new();
    let body = "{definitely not json";
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap();

    let (status, _) = post_raw(&env, body, Some(&signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(env.count("webhook_events"), 0);
}

#[test]
fn test_other_event_types_are_recorded_only() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Other Events");
    let body = json!({ "event_type": "payout.paid", "data": { "merchant_id": m.id() } }).to_string();
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap();

    let mut conn = env.conn();
    let event =
        receive_processor_event(&mut conn, &ctx(), TEST_WEBHOOK_SECRET, body.as_bytes(), Some(&signature))
            .unwrap();
    assert_eq!(event.event_type, "payout.paid");
    assert_eq!(event.merchant_id.as_deref(), Some(m.id()));
    assert!(queries::list_audit_logs(&conn, m.id()).unwrap().is_empty());
}

#[test]
fn test_chargeback_for_unknown_intent_is_still_recorded() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Unknown Intent");
    let body = chargeback(m.id(), "pi_does_not_exist");
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap();

    let mut conn = env.conn();
    let event =
        receive_processor_event(&mut conn, &ctx(), TEST_WEBHOOK_SECRET, body.as_bytes(), Some(&signature))
            .unwrap();
    assert_eq!(event.delivery_status, DeliveryStatus::Succeeded);
    drop(conn);
    assert_eq!(env.count("webhook_events"), 1);
}
