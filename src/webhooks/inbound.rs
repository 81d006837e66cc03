use rusqlite::{Connection, TransactionBehavior};

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::crypto::verify_signature;
use crate::db::queries::{self, now};
use crate::error::{AppError, Result};
use crate::models::{
    ActorType, DeliveryStatus, DisputeStatus, EVENT_CHARGEBACK_OPENED, NewWebhookEvent,
    WebhookEvent,
};

/// Verify, record, and apply an event sent by the payment processor.
///
/// The signature is checked against the HMAC of the raw body in constant time
/// before anything is parsed. An invalid or missing signature changes nothing.
/// A valid event is stored as already delivered; `chargeback.opened` also opens a
/// dispute on the referenced intent when it can be resolved.
pub fn receive_processor_event(
    conn: &mut Connection,
    ctx: &RequestContext,
    secret: &str,
    raw_body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookEvent> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AppError::InvalidSignature)?;
    if !verify_signature(secret, raw_body, signature)? {
        tracing::warn!(request_id = %ctx.request_id, "Inbound webhook rejected: invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let payload: serde_json::Value = serde_json::from_slice(raw_body)?;
    let event_type = payload
        .get("event_type")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("event_type is required".into()))?
        .to_string();
    let data = payload.get("data");
    let merchant_ref = data.and_then(|d| d.get("merchant_id")).and_then(|v| v.as_str());
    let intent_ref = data
        .and_then(|d| d.get("payment_intent_id"))
        .and_then(|v| v.as_str());

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let merchant = match merchant_ref {
        Some(id) => queries::get_merchant_by_id(&tx, id)?,
        None => None,
    };

    let event = queries::create_webhook_event(
        &tx,
        &NewWebhookEvent {
            merchant_id: merchant.as_ref().map(|m| m.id.clone()),
            event_type: event_type.clone(),
            payload: String::from_utf8_lossy(raw_body).into_owned(),
            signature: signature.to_string(),
            delivery_status: DeliveryStatus::Succeeded,
            delivered_at: Some(now()),
        },
    )?;

    if event_type == EVENT_CHARGEBACK_OPENED {
        let intent = match (&merchant, intent_ref) {
            (Some(m), Some(pi)) => queries::get_payment_intent(&tx, &m.id, pi)?,
            _ => None,
        };
        match intent {
            Some(intent) => {
                queries::set_dispute_status(&tx, &intent.id, DisputeStatus::Open)?;
                AuditLogBuilder::new(&tx, ctx)
                    .merchant(&intent.merchant_id)
                    .actor(ActorType::Processor, None)
                    .action(AuditAction::ChargebackOpened)
                    .resource("payment_intent", &intent.id)
                    .metadata(serde_json::json!({
                        "webhook_event_id": event.id,
                        "previous_dispute_status": intent.dispute_status,
                    }))
                    .save()?;
                tracing::info!(
                    request_id = %ctx.request_id,
                    payment_intent_id = %intent.id,
                    "Chargeback opened"
                );
            }
            None => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    webhook_event_id = %event.id,
                    "Chargeback references an unknown payment intent"
                );
            }
        }
    }

    tx.commit()?;

    tracing::info!(
        request_id = %ctx.request_id,
        webhook_event_id = %event.id,
        event_type = %event.event_type,
        "Processor webhook received"
    );
    Ok(event)
}
