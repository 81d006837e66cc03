use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::Instrument;

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg, sanitize_error_message};
use crate::id;
use crate::idempotency::{self, OperationResponse, endpoint};
use crate::ledger;
use crate::models::{
    LedgerEntryType, NewLedgerEntry, NewTransaction, PaymentIntent, PaymentIntentStatus as Status,
    PaymentIntentView, TIMEOUT_FAILURE_CODE, TIMEOUT_FAILURE_MESSAGE, Transaction,
    TransactionKind, TransactionStatus,
};
use crate::processor::{ProcessorOutcome, attempt_with_timeout};
use crate::webhooks::{record_transaction_event, transaction_event_type};

use super::intents::intent_view;

/// A state-machine operation on a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Authorize,
    Capture,
    Void,
    /// `None` refunds whatever is still refundable.
    Refund { amount_cents: Option<i64> },
}

impl Operation {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Authorize => TransactionKind::Authorize,
            Self::Capture => TransactionKind::Capture,
            Self::Void => TransactionKind::Void,
            Self::Refund { .. } => TransactionKind::Refund,
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            Self::Authorize => endpoint::AUTHORIZE,
            Self::Capture => endpoint::CAPTURE,
            Self::Void => endpoint::VOID,
            Self::Refund { .. } => endpoint::REFUND,
        }
    }

    fn params(&self, payment_intent_id: &str) -> serde_json::Value {
        match self {
            Self::Refund { amount_cents } => serde_json::json!({
                "payment_intent_id": payment_intent_id,
                "amount_cents": amount_cents,
            }),
            _ => serde_json::json!({ "payment_intent_id": payment_intent_id }),
        }
    }

    /// Statuses the intent may be in for the operation to proceed.
    fn allowed_from(&self) -> &'static [Status] {
        match self {
            Self::Authorize => &[Status::Created],
            Self::Capture => &[Status::Authorized],
            Self::Void => &[Status::Created, Status::Authorized],
            Self::Refund { .. } => &[Status::Captured],
        }
    }

    /// Status after the processor outcome, if it changes.
    fn next_status(&self, approved: bool) -> Option<Status> {
        match (self, approved) {
            (Self::Authorize, true) => Some(Status::Authorized),
            (Self::Authorize, false) => Some(Status::Failed),
            (Self::Capture, true) => Some(Status::Captured),
            (Self::Void, true) => Some(Status::Canceled),
            _ => None,
        }
    }

    fn success_status(&self) -> StatusCode {
        match self {
            Self::Refund { .. } => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }
}

#[derive(Serialize)]
struct OperationData {
    transaction: Transaction,
    payment_intent: PaymentIntentView,
    #[serde(skip_serializing_if = "Option::is_none")]
    refund_amount_cents: Option<i64>,
}

#[derive(Serialize)]
struct OperationEnvelope {
    data: OperationData,
}

/// Validate the operation against the intent's current state and return the
/// amount the processor will be asked to move.
fn check_precondition(conn: &Connection, intent: &PaymentIntent, op: Operation) -> Result<i64> {
    let kind = op.kind();

    if op == Operation::Capture
        && queries::has_succeeded_transaction(conn, &intent.id, TransactionKind::Capture)?
    {
        return Err(AppError::AlreadyCaptured);
    }

    if !op.allowed_from().contains(&intent.status) {
        return Err(AppError::InvalidState(format!(
            "Cannot {} payment intent in status {}",
            kind.as_ref(),
            intent.status.as_ref()
        )));
    }

    match op {
        Operation::Refund { amount_cents } => {
            let refundable = ledger::refundable_cents(conn, intent)?;
            let requested = amount_cents.unwrap_or(refundable);
            if requested <= 0 || requested > refundable {
                return Err(AppError::InvalidRefundAmount {
                    requested,
                    refundable,
                });
            }
            Ok(requested)
        }
        _ => Ok(intent.amount_cents),
    }
}

fn load_intent(conn: &Connection, merchant_id: &str, intent_id: &str) -> Result<PaymentIntent> {
    queries::get_payment_intent(conn, merchant_id, intent_id)?
        .ok_or_else(|| AppError::NotFound(msg::PAYMENT_INTENT_NOT_FOUND.into()))
}

fn failure_fields(
    kind: TransactionKind,
    outcome: ProcessorOutcome,
) -> (TransactionStatus, Option<String>, Option<String>) {
    match outcome {
        ProcessorOutcome::Approved => (TransactionStatus::Succeeded, None, None),
        ProcessorOutcome::Declined => {
            let (code, message) = kind.decline_reason();
            (
                TransactionStatus::Failed,
                Some(code.to_string()),
                Some(message.to_string()),
            )
        }
        ProcessorOutcome::TimedOut => (
            TransactionStatus::Failed,
            Some(TIMEOUT_FAILURE_CODE.to_string()),
            Some(TIMEOUT_FAILURE_MESSAGE.to_string()),
        ),
    }
}

/// Everything that must commit or roll back together. Returns the response
/// and the webhook event to enqueue once the unit is committed.
#[allow(clippy::too_many_arguments)]
fn apply_outcome(
    conn: &mut Connection,
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    op: Operation,
    amount_cents: i64,
    outcome: ProcessorOutcome,
) -> Result<(OperationResponse, Option<String>)> {
    let kind = op.kind();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // Another writer may have moved the intent while the processor was running.
    let intent = load_intent(&tx, merchant_id, intent_id)?;
    let recheck = match op {
        Operation::Refund { .. } => Operation::Refund {
            amount_cents: Some(amount_cents),
        },
        other => other,
    };
    check_precondition(&tx, &intent, recheck)?;

    let (status, failure_code, failure_message) = failure_fields(kind, outcome);
    let txn = queries::create_transaction(
        &tx,
        &NewTransaction {
            payment_intent_id: intent.id.clone(),
            kind,
            status,
            amount_cents,
            processor_ref: id::processor_ref(),
            failure_code,
            failure_message,
        },
    )?;

    if outcome == ProcessorOutcome::TimedOut {
        tracing::info!(
            event = "processor_timeout",
            payment_intent_id = %intent.id,
            transaction_id = %txn.id,
            kind = kind.as_ref(),
            timeout_seconds = state.processor_timeout.as_secs_f64(),
            "Processor call timed out"
        );
    }

    if let Some(to) = op.next_status(txn.succeeded()) {
        if !queries::transition_payment_intent(&tx, &intent.id, op.allowed_from(), to)? {
            return Err(AppError::Internal(format!(
                "payment intent {} left {} unexpectedly",
                intent.id,
                intent.status.as_ref()
            )));
        }
    }

    if txn.succeeded() {
        let entry = match kind {
            TransactionKind::Capture => Some((LedgerEntryType::Charge, amount_cents)),
            TransactionKind::Refund => Some((LedgerEntryType::Refund, -amount_cents)),
            TransactionKind::Authorize | TransactionKind::Void => None,
        };
        if let Some((entry_type, signed_amount)) = entry {
            ledger::append(
                &tx,
                &NewLedgerEntry {
                    merchant_id: merchant_id.to_string(),
                    transaction_id: Some(txn.id.clone()),
                    entry_type,
                    amount_cents: signed_amount,
                    currency: intent.currency.clone(),
                },
            )?;
        }
    }

    let mut metadata = serde_json::json!({
        "payment_intent_id": intent.id,
        "amount_cents": amount_cents,
        "status": txn.status,
        "failure_code": txn.failure_code,
    });
    if kind == TransactionKind::Refund {
        let refundable_before = ledger::refundable_cents(&tx, &intent)?
            + if txn.succeeded() { amount_cents } else { 0 };
        metadata["refund_type"] = serde_json::Value::from(if amount_cents == refundable_before {
            "full"
        } else {
            "partial"
        });
    }
    AuditLogBuilder::new(&tx, ctx)
        .merchant(merchant_id)
        .action(AuditAction::for_operation(kind, txn.succeeded()))
        .resource("transaction", &txn.id)
        .metadata(metadata)
        .save()?;

    let event_id = match transaction_event_type(&txn) {
        Some(event_type) => Some(
            record_transaction_event(&tx, &state.webhook.secret, event_type, &intent, &txn)?.id,
        ),
        None => None,
    };

    let updated = load_intent(&tx, merchant_id, intent_id)?;
    let view = intent_view(&tx, updated, false)?;
    let response = OperationResponse::json(
        op.success_status(),
        &OperationEnvelope {
            data: OperationData {
                transaction: txn,
                payment_intent: view,
                refund_amount_cents: (kind == TransactionKind::Refund).then_some(amount_cents),
            },
        },
    )?;

    tx.commit()?;
    Ok((response, event_id))
}

async fn run_operation(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    op: Operation,
) -> Result<OperationResponse> {
    let kind = op.kind();

    let amount_cents = {
        let conn = state.db.get()?;
        let intent = load_intent(&conn, merchant_id, intent_id)?;
        check_precondition(&conn, &intent, op)?
    };

    let outcome = attempt_with_timeout(
        state.processor.as_ref(),
        kind,
        amount_cents,
        state.processor_timeout,
    )
    .await;

    let applied = {
        let mut conn = state.db.get()?;
        apply_outcome(
            &mut conn,
            state,
            ctx,
            merchant_id,
            intent_id,
            op,
            amount_cents,
            outcome,
        )
    };

    let (response, event_id) = match applied {
        Ok(applied) => applied,
        Err(e) if e.is_internal() => {
            tracing::error!(
                error = %sanitize_error_message(&e.to_string()),
                kind = kind.as_ref(),
                "Payment operation rolled back"
            );
            return Err(AppError::Internal(msg::GENERIC_FAILURE.into()));
        }
        Err(e) => return Err(e),
    };

    if let Some(event_id) = event_id {
        state.queue.enqueue(&event_id);
    }

    tracing::info!(
        kind = kind.as_ref(),
        outcome = ?outcome,
        amount_cents,
        "Payment operation completed"
    );
    Ok(response)
}

/// Run one operation under the idempotency guard.
///
/// Processor declines and timeouts are successful responses carrying a failed
/// transaction. Validation and state errors leave no trace and release the key.
pub async fn execute(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    op: Operation,
    idempotency_key: Option<&str>,
) -> Result<OperationResponse> {
    let span = tracing::info_span!(
        "payment_operation",
        request_id = %ctx.request_id,
        merchant_id,
        payment_intent_id = intent_id,
        kind = op.kind().as_ref(),
    );

    async {
        idempotency::run_guarded(
            &state.db,
            merchant_id,
            idempotency_key,
            op.endpoint(),
            &op.params(intent_id),
            || run_operation(state, ctx, merchant_id, intent_id, op),
        )
        .await
    }
    .instrument(span)
    .await
}

pub async fn authorize(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    idempotency_key: Option<&str>,
) -> Result<OperationResponse> {
    execute(state, ctx, merchant_id, intent_id, Operation::Authorize, idempotency_key).await
}

pub async fn capture(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    idempotency_key: Option<&str>,
) -> Result<OperationResponse> {
    execute(state, ctx, merchant_id, intent_id, Operation::Capture, idempotency_key).await
}

pub async fn void(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    idempotency_key: Option<&str>,
) -> Result<OperationResponse> {
    execute(state, ctx, merchant_id, intent_id, Operation::Void, idempotency_key).await
}

pub async fn refund(
    state: &AppState,
    ctx: &RequestContext,
    merchant_id: &str,
    intent_id: &str,
    amount_cents: Option<i64>,
    idempotency_key: Option<&str>,
) -> Result<OperationResponse> {
    execute(
        state,
        ctx,
        merchant_id,
        intent_id,
        Operation::Refund { amount_cents },
        idempotency_key,
    )
    .await
}
