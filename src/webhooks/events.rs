use chrono::{DateTime, SecondsFormat};
use rusqlite::Connection;
use serde::Serialize;

use crate::crypto::sign_payload;
use crate::db::queries;
use crate::error::Result;
use crate::models::{
    DeliveryStatus, EVENT_TRANSACTION_FAILED, EVENT_TRANSACTION_SUCCEEDED, NewWebhookEvent,
    PaymentIntent, Transaction, TransactionKind, TransactionKind as Kind, TransactionStatus,
    WebhookEvent,
};

#[derive(Serialize)]
struct EventEnvelope<'a, T: Serialize> {
    event_type: &'a str,
    data: T,
}

#[derive(Serialize)]
struct TransactionEventData<'a> {
    merchant_id: &'a str,
    payment_intent_id: &'a str,
    transaction_id: &'a str,
    transaction_kind: TransactionKind,
    transaction_status: TransactionStatus,
    amount_cents: i64,
    currency: &'a str,
    processor_ref: &'a str,
    failure_code: Option<&'a str>,
    failure_message: Option<&'a str>,
    created_at: String,
}

fn rfc3339(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Which outbound event, if any, an operation outcome announces.
///
/// Every success is announced. Failures are announced for authorize and capture
/// only.
pub fn transaction_event_type(txn: &Transaction) -> Option<&'static str> {
    match (txn.status, txn.kind) {
        (TransactionStatus::Succeeded, _) => Some(EVENT_TRANSACTION_SUCCEEDED),
        (TransactionStatus::Failed, Kind::Authorize | Kind::Capture) => {
            Some(EVENT_TRANSACTION_FAILED)
        }
        (TransactionStatus::Failed, Kind::Void | Kind::Refund) => None,
    }
}

/// Sign and persist a pending event for a transaction outcome.
///
/// Must run inside the caller's atomic unit; enqueue the returned id only after
/// that unit commits.
pub fn record_transaction_event(
    conn: &Connection,
    secret: &str,
    event_type: &str,
    intent: &PaymentIntent,
    txn: &Transaction,
) -> Result<WebhookEvent> {
    let envelope = EventEnvelope {
        event_type,
        data: TransactionEventData {
            merchant_id: &intent.merchant_id,
            payment_intent_id: &intent.id,
            transaction_id: &txn.id,
            transaction_kind: txn.kind,
            transaction_status: txn.status,
            amount_cents: txn.amount_cents,
            currency: &intent.currency,
            processor_ref: &txn.processor_ref,
            failure_code: txn.failure_code.as_deref(),
            failure_message: txn.failure_message.as_deref(),
            created_at: rfc3339(txn.created_at),
        },
    };
    let payload = serde_json::to_string(&envelope)?;
    let signature = sign_payload(secret, payload.as_bytes())?;

    queries::create_webhook_event(
        conn,
        &NewWebhookEvent {
            merchant_id: Some(intent.merchant_id.clone()),
            event_type: event_type.to_string(),
            payload,
            signature,
            delivery_status: DeliveryStatus::Pending,
            delivered_at: None,
        },
    )
}
