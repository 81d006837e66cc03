//! Merchants never see or touch each other's data.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::payments;

#[tokio::test]
async fn test_operations_on_foreign_intent_are_not_found() {
    let env = TestEnv::new();
    let owner = create_test_merchant(&env, "Owner");
    let intruder = create_test_merchant(&env, "Intruder");
    let pi = create_test_intent(&env, &owner, 1_000);

    let err = payments::authorize(&env.state, &ctx(), intruder.id(), &pi.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = payments::refund(&env.state, &ctx(), intruder.id(), &pi.id, Some(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(env.transactions(&pi.id).is_empty());
    assert_eq!(env.intent(&owner, &pi.id).status, PaymentIntentStatus::Created);

    let conn = env.conn();
    let err = payments::get_intent_view(&conn, intruder.id(), &pi.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_cannot_create_intent_for_foreign_customer() {
    let env = TestEnv::new();
    let owner = create_test_merchant(&env, "Owner");
    let intruder = create_test_merchant(&env, "Intruder");

    let err = payments::create_payment_intent(
        &env.state,
        &ctx(),
        intruder.id(),
        CreatePaymentIntent {
            customer_id: owner.customer.id.clone(),
            payment_method_id: None,
            amount_cents: 1_000,
            currency: None,
            idempotency_key: None,
            metadata: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Payment method of another customer
    let err = payments::create_payment_intent(
        &env.state,
        &ctx(),
        intruder.id(),
        CreatePaymentIntent {
            customer_id: intruder.customer.id.clone(),
            payment_method_id: Some(owner.payment_method.id.clone()),
            amount_cents: 1_000,
            currency: None,
            idempotency_key: None,
            metadata: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(env.count("payment_intents"), 0);
}

#[tokio::test]
async fn test_same_idempotency_key_is_independent_per_merchant() {
    let env = TestEnv::new();
    let a = create_test_merchant(&env, "A");
    let b = create_test_merchant(&env, "B");
    let pi_a = create_test_intent(&env, &a, 1_000);
    let pi_b = create_test_intent(&env, &b, 2_000);

    let ra = payments::authorize(&env.state, &ctx(), a.id(), &pi_a.id, Some("same"))
        .await
        .unwrap();
    let rb = payments::authorize(&env.state, &ctx(), b.id(), &pi_b.id, Some("same"))
        .await
        .unwrap();
    assert_ne!(ra, rb);
    assert_eq!(body(&rb)["data"]["payment_intent"]["id"], pi_b.id.as_str());
}
