//! A failure inside the atomic unit leaves no partial writes.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::error::msg;
use paygate::payments;

fn break_ledger(env: &TestEnv) {
    env.conn()
        .execute_batch(
            "CREATE TRIGGER ledger_unavailable BEFORE INSERT ON ledger_entries
             BEGIN SELECT RAISE(ABORT, 'disk I/O error password=hunter2'); END;",
        )
        .unwrap();
}

fn repair_ledger(env: &TestEnv) {
    env.conn()
        .execute_batch("DROP TRIGGER ledger_unavailable;")
        .unwrap();
}

fn snapshot(env: &TestEnv) -> [i64; 4] {
    [
        env.count("transactions"),
        env.count("ledger_entries"),
        env.count("audit_logs"),
        env.count("webhook_events"),
    ]
}

#[tokio::test]
async fn test_ledger_failure_rolls_back_capture() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Rollback");
    let pi = create_test_intent(&env, &m, 10_000);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.queue.take();

    let before = snapshot(&env);
    break_ledger(&env);

    let err = payments::capture(&env.state, &ctx(), m.id(), &pi.id, Some("cap-rollback"))
        .await
        .unwrap_err();

    // Surfaced as a generic failure, internals hidden
    assert_eq!(err.code(), "internal_error");
    match &err {
        AppError::Internal(message) => assert_eq!(message, msg::GENERIC_FAILURE),
        other => panic!("expected internal error, got {:?}", other),
    }

    assert_eq!(snapshot(&env), before);
    assert_eq!(env.intent(&m, &pi.id).status, PaymentIntentStatus::Authorized);
    assert!(env.queue.is_empty());
    assert_eq!(env.count("idempotency_records"), 0);

    // The key is free again once the store recovers
    repair_ledger(&env);
    let resp = payments::capture(&env.state, &ctx(), m.id(), &pi.id, Some("cap-rollback"))
        .await
        .unwrap();
    assert_eq!(body(&resp)["data"]["payment_intent"]["status"], "captured");
    assert_eq!(env.count("ledger_entries"), 1);
}

#[tokio::test]
async fn test_ledger_failure_rolls_back_refund() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Refund Rollback");
    let pi = create_test_intent(&env, &m, 5_000);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    payments::capture(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();

    let before = snapshot(&env);
    break_ledger(&env);

    let err = payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(1_000), None)
        .await
        .unwrap_err();
    assert!(err.is_internal());
    assert_eq!(snapshot(&env), before);

    let conn = env.conn();
    let intent = queries::get_payment_intent(&conn, m.id(), &pi.id).unwrap().unwrap();
    assert_eq!(paygate::ledger::refundable_cents(&conn, &intent).unwrap(), 5_000);
}
