//! Refund validation and the refundable balance.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::ledger;
use paygate::payments;

async fn captured_intent(env: &TestEnv, m: &TestMerchant, amount_cents: i64) -> PaymentIntent {
    let pi = create_test_intent(env, m, amount_cents);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    payments::capture(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.intent(m, &pi.id)
}

#[tokio::test]
async fn test_partial_then_remaining_refund_scenario() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Scenario");
    let pi = captured_intent(&env, &m, 10_000).await;

    {
        let conn = env.conn();
        assert_eq!(ledger::refundable_cents(&conn, &pi).unwrap(), 10_000);
    }

    let resp = payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(3_000), None)
        .await
        .unwrap();
    assert_eq!(resp.status, 201);
    let json = body(&resp);
    assert_eq!(json["data"]["refund_amount_cents"], 3_000);
    assert_eq!(json["data"]["payment_intent"]["refundable_cents"], 7_000);
    assert_eq!(json["data"]["payment_intent"]["total_refunded_cents"], 3_000);

    // No amount refunds the remainder
    let json = body(
        &payments::refund(&env.state, &ctx(), m.id(), &pi.id, None, None)
            .await
            .unwrap(),
    );
    assert_eq!(json["data"]["refund_amount_cents"], 7_000);
    assert_eq!(json["data"]["payment_intent"]["refundable_cents"], 0);
    assert_eq!(json["data"]["payment_intent"]["total_refunded_cents"], 10_000);
    assert_eq!(json["data"]["payment_intent"]["status"], "captured");

    let conn = env.conn();
    let totals = ledger::totals(&conn, m.id()).unwrap();
    assert_eq!(totals.charges_total, 10_000);
    assert_eq!(totals.refunds_total, 10_000);
    assert_eq!(totals.net, 0);

    let logs = queries::list_audit_logs(&conn, m.id()).unwrap();
    let kinds: Vec<&str> = logs
        .iter()
        .filter(|l| l.action == "payment_refunded")
        .map(|l| l.metadata["refund_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"partial"));
    assert!(kinds.contains(&"full"));
}

#[tokio::test]
async fn test_refund_amount_validation() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Validation");
    let pi = captured_intent(&env, &m, 2_000).await;
    let before = env.count("transactions");

    for amount in [0, -5, 2_001] {
        let err = payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(amount), None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::InvalidRefundAmount { refundable: 2_000, .. }),
            "amount {} should be rejected, got {:?}",
            amount,
            err
        );
        assert_eq!(err.code(), "validation_error");
    }
    assert_eq!(env.count("transactions"), before);

    payments::refund(&env.state, &ctx(), m.id(), &pi.id, None, None).await.unwrap();
    // Nothing left to refund
    let err = payments::refund(&env.state, &ctx(), m.id(), &pi.id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRefundAmount { refundable: 0, .. }));
}

#[tokio::test]
async fn test_refund_requires_captured() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Not Captured");
    let pi = create_test_intent(&env, &m, 1_000);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();

    let err = payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(100), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let conn = env.conn();
    let intent = queries::get_payment_intent(&conn, m.id(), &pi.id).unwrap().unwrap();
    assert_eq!(ledger::refundable_cents(&conn, &intent).unwrap(), 0);
}

#[tokio::test]
async fn test_declined_refund_changes_no_balance() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Refund Decline");
    let pi = captured_intent(&env, &m, 3_000).await;
    env.queue.take();

    env.processor.set_declined(TransactionKind::Refund, true);
    let resp = payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(1_000), None)
        .await
        .unwrap();
    let json = body(&resp);
    assert_eq!(json["data"]["transaction"]["status"], "failed");
    assert_eq!(json["data"]["transaction"]["failure_code"], "refund_failed");
    assert_eq!(json["data"]["payment_intent"]["refundable_cents"], 3_000);
    assert_eq!(json["data"]["payment_intent"]["status"], "captured");

    assert_eq!(env.count("ledger_entries"), 1);
    assert!(env.queue.is_empty());
}

#[tokio::test]
async fn test_refundable_matches_transaction_sums() {
    let env = TestEnv::new();
    let m = create_test_merchant(&env, "Invariant");
    let pi = captured_intent(&env, &m, 9_999).await;

    for amount in [1, 1_000, 4_321] {
        payments::refund(&env.state, &ctx(), m.id(), &pi.id, Some(amount), None)
            .await
            .unwrap();

        let conn = env.conn();
        let intent = queries::get_payment_intent(&conn, m.id(), &pi.id).unwrap().unwrap();
        let captured =
            queries::sum_succeeded_amount(&conn, &pi.id, TransactionKind::Capture).unwrap();
        let refunded =
            queries::sum_succeeded_amount(&conn, &pi.id, TransactionKind::Refund).unwrap();
        let refundable = ledger::refundable_cents(&conn, &intent).unwrap();
        assert_eq!(refundable, captured - refunded);
        assert!(refundable >= 0);
    }
}
