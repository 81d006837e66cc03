use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::idempotency::{self, OperationResponse, endpoint};
use crate::ledger;
use crate::models::{CreatePaymentIntent, PaymentIntent, PaymentIntentView};

/// Attach ledger-derived balances (and optionally the transaction history).
pub fn intent_view(
    conn: &Connection,
    intent: PaymentIntent,
    with_transactions: bool,
) -> Result<PaymentIntentView> {
    let refundable_cents = ledger::refundable_cents(conn, &intent)?;
    let total_refunded_cents = ledger::total_refunded_cents(conn, &intent.id)?;
    let transactions = if with_transactions {
        Some(queries::list_transactions_for_intent(conn, &intent.id)?)
    } else {
        None
    };
    Ok(PaymentIntentView {
        intent,
        refundable_cents,
        total_refunded_cents,
        transactions,
    })
}

pub fn list_intent_views(
    conn: &Connection,
    merchant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PaymentIntentView>, i64)> {
    let (intents, total) = queries::list_payment_intents(conn, merchant_id, limit, offset)?;
    let views = intents
        .into_iter()
        .map(|intent| intent_view(conn, intent, false))
        .collect::<Result<Vec<_>>>()?;
    Ok((views, total))
}

fn create_in_unit(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    input: &CreatePaymentIntent,
) -> Result<OperationResponse> {
    if input.amount_cents <= 0 {
        return Err(AppError::Validation(
            "amount_cents must be greater than 0".into(),
        ));
    }
    let currency = input
        .normalized_currency()
        .map_err(|m| AppError::Validation(m.into()))?;
    let metadata = input
        .metadata
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    if !metadata.is_object() {
        return Err(AppError::Validation("metadata must be an object".into()));
    }

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let customer = queries::get_customer(&tx, merchant_id, &input.customer_id)?.ok_or_else(|| {
        AppError::Validation("Customer does not belong to this merchant".into())
    })?;
    if let Some(pm_id) = input.payment_method_id.as_deref() {
        queries::get_payment_method_for_customer(&tx, &customer.id, pm_id)?.ok_or_else(|| {
            AppError::Validation("Payment method does not belong to this customer".into())
        })?;
    }

    let intent = queries::create_payment_intent(
        &tx,
        &queries::NewPaymentIntent {
            merchant_id,
            customer_id: &customer.id,
            payment_method_id: input.payment_method_id.as_deref(),
            amount_cents: input.amount_cents,
            currency: &currency,
            idempotency_key: input
                .idempotency_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty()),
            metadata: &metadata,
        },
    )?;

    AuditLogBuilder::new(&tx, ctx)
        .merchant(merchant_id)
        .action(AuditAction::PaymentIntentCreated)
        .resource("payment_intent", &intent.id)
        .metadata(serde_json::json!({
            "amount_cents": intent.amount_cents,
            "currency": intent.currency,
        }))
        .save()?;

    let view = intent_view(&tx, intent, false)?;
    tx.commit()?;

    tracing::info!(
        request_id = %ctx.request_id,
        merchant_id,
        payment_intent_id = %view.intent.id,
        amount_cents = view.intent.amount_cents,
        "Payment intent created"
    );

    OperationResponse::json(StatusCode::CREATED, &serde_json::json!({ "data": view }))
}

/// Create an intent in `created` status, deduplicated by its idempotency key.
pub async fn create_payment_intent(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    input: CreatePaymentIntent,
) -> Result<OperationResponse> {
    let params = serde_json::json!({
        "customer_id": input.customer_id,
        "payment_method_id": input.payment_method_id,
        "amount_cents": input.amount_cents,
        "currency": input.currency,
        "idempotency_key": input.idempotency_key,
        "metadata": input.metadata,
    });

    idempotency::run_guarded(
        &state.db,
        merchant_id,
        input.idempotency_key.as_deref(),
        endpoint::CREATE_PAYMENT_INTENT,
        &params,
        || async { create_in_unit(state, ctx, merchant_id, &input) },
    )
    .await
}

/// Load one intent scoped to the merchant, with its transactions.
pub fn get_intent_view(conn: &Connection, merchant_id: &str, id: &str) -> Result<PaymentIntentView> {
    let intent = queries::get_payment_intent(conn, merchant_id, id)?
        .ok_or_else(|| AppError::NotFound(msg::PAYMENT_INTENT_NOT_FOUND.into()))?;
    intent_view(conn, intent, true)
}
