//! Concurrent operations on one intent leave exactly one winner.

use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::payments;

fn slow_env() -> TestEnv {
    TestEnv::with_processor(
        ScriptedProcessor::approve_all().with_latency(Duration::from_millis(100)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_captures_charge_once() {
    let env = slow_env();
    let m = create_test_merchant(&env, "Racing Captures");
    let pi = create_test_intent(&env, &m, 1_000);
    env.processor.set_latency(None);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.processor.set_latency(Some(Duration::from_millis(100)));

    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (a, b) = tokio::join!(
        payments::capture(&env.state, &ctx_a, m.id(), &pi.id, None),
        payments::capture(&env.state, &ctx_b, m.id(), &pi.id, None),
    );

    let (won, lost) = match (a, b) {
        (Ok(resp), Err(err)) | (Err(err), Ok(resp)) => (resp, err),
        other => panic!("expected exactly one winner, got {:?}", other),
    };
    assert_eq!(won.status, 200);
    assert!(matches!(lost, AppError::AlreadyCaptured));

    assert_eq!(env.count("ledger_entries"), 1);
    let captures: Vec<_> = env
        .transactions(&pi.id)
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Capture)
        .collect();
    assert_eq!(captures.len(), 1);
    assert_eq!(env.intent(&m, &pi.id).status, PaymentIntentStatus::Captured);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refunds_never_exceed_capture() {
    let env = slow_env();
    let m = create_test_merchant(&env, "Racing Refunds");
    let pi = create_test_intent(&env, &m, 1_000);
    env.processor.set_latency(None);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    payments::capture(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.processor.set_latency(Some(Duration::from_millis(100)));

    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (a, b) = tokio::join!(
        payments::refund(&env.state, &ctx_a, m.id(), &pi.id, Some(700), None),
        payments::refund(&env.state, &ctx_b, m.id(), &pi.id, Some(700), None),
    );

    let (won, lost) = match (a, b) {
        (Ok(resp), Err(err)) | (Err(err), Ok(resp)) => (resp, err),
        other => panic!("expected exactly one winner, got {:?}", other),
    };
    assert_eq!(won.status, 201);
    assert!(matches!(
        lost,
        AppError::InvalidRefundAmount {
            requested: 700,
            refundable: 300
        }
    ));
    assert_eq!(lost.code(), "validation_error");

    // One charge and one refund
    assert_eq!(env.count("ledger_entries"), 2);
    let conn = env.conn();
    let intent = queries::get_payment_intent(&conn, m.id(), &pi.id).unwrap().unwrap();
    assert_eq!(paygate::ledger::refundable_cents(&conn, &intent).unwrap(), 300);
}

#[tokio::test(start_paused = true)]
async fn test_void_racing_capture_has_one_winner() {
    let env = slow_env();
    let m = create_test_merchant(&env, "Void vs Capture");
    let pi = create_test_intent(&env, &m, 1_000);
    env.processor.set_latency(None);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.processor.set_latency(Some(Duration::from_millis(100)));

    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (capture, void) = tokio::join!(
        payments::capture(&env.state, &ctx_a, m.id(), &pi.id, None),
        payments::void(&env.state, &ctx_b, m.id(), &pi.id, None),
    );
    assert!(capture.is_ok() != void.is_ok(), "exactly one operation should win");

    let status = env.intent(&m, &pi.id).status;
    if capture.is_ok() {
        assert_eq!(status, PaymentIntentStatus::Captured);
        assert_eq!(env.count("ledger_entries"), 1);
    } else {
        assert_eq!(status, PaymentIntentStatus::Canceled);
        assert_eq!(env.count("ledger_entries"), 0);
    }
}
