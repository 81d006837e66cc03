//! Merchant metrics, derived from the store on every read.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::Result;
use crate::ledger;
use crate::models::{DeliveryStatus, TransactionKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MerchantMetrics {
    pub payment_intents_created: i64,
    pub transactions_authorized: i64,
    pub transactions_captured: i64,
    pub transactions_refunded: i64,
    pub webhook_events_received: i64,
    pub webhook_delivery_failures: i64,
    pub captured_volume_cents: i64,
    /// Magnitude of all refund ledger entries.
    pub refunded_cents: i64,
    /// Charges minus refunds minus fees.
    pub net_cents: i64,
}

/// Transaction counts include failed attempts; volumes count succeeded ones only.
pub fn compute(conn: &Connection, merchant_id: &str) -> Result<MerchantMetrics> {
    let totals = ledger::totals(conn, merchant_id)?;
    let count_kind =
        |kind| queries::count_merchant_transactions(conn, merchant_id, kind, None);

    Ok(MerchantMetrics {
        payment_intents_created: queries::count_payment_intents(conn, merchant_id)?,
        transactions_authorized: count_kind(TransactionKind::Authorize)?,
        transactions_captured: count_kind(TransactionKind::Capture)?,
        transactions_refunded: count_kind(TransactionKind::Refund)?,
        webhook_events_received: queries::count_webhook_events(conn, merchant_id, None, None)?,
        webhook_delivery_failures: queries::count_webhook_events(
            conn,
            merchant_id,
            None,
            Some(DeliveryStatus::Failed),
        )?,
        captured_volume_cents: queries::sum_merchant_succeeded_amount(
            conn,
            merchant_id,
            TransactionKind::Capture,
        )?,
        refunded_cents: totals.refunds_total,
        net_cents: totals.net,
    })
}
