//! Append-only ledger and the balances derived from it.
//!
//! Nothing here caches a counter: every balance is recomputed from the rows that
//! exist at the moment of the read, so it is always consistent with the ledger
//! and transaction tables inside the same database transaction.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    LedgerEntry, LedgerEntryType, LedgerTotals, NewLedgerEntry, PaymentIntent,
    PaymentIntentStatus, TransactionKind,
};

/// Append one entry. Charges and fees must be positive, refunds negative.
pub fn append(conn: &Connection, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
    let sign_ok = match entry.entry_type {
        LedgerEntryType::Charge | LedgerEntryType::Fee => entry.amount_cents > 0,
        LedgerEntryType::Refund => entry.amount_cents < 0,
    };
    if !sign_ok {
        return Err(AppError::Internal(format!(
            "ledger {} entry has wrong sign: {}",
            entry.entry_type.as_ref(),
            entry.amount_cents
        )));
    }
    if entry.currency.len() != 3 {
        return Err(AppError::Internal("ledger currency must be 3 letters".into()));
    }
    queries::insert_ledger_entry(conn, entry)
}

/// Sum of succeeded refund amounts for an intent (positive magnitude).
pub fn total_refunded_cents(conn: &Connection, payment_intent_id: &str) -> Result<i64> {
    queries::sum_succeeded_amount(conn, payment_intent_id, TransactionKind::Refund)
}

/// Captured minus refunded. Zero unless the intent is captured.
pub fn refundable_cents(conn: &Connection, intent: &PaymentIntent) -> Result<i64> {
    if intent.status != PaymentIntentStatus::Captured {
        return Ok(0);
    }
    let captured = queries::sum_succeeded_amount(conn, &intent.id, TransactionKind::Capture)?;
    let refunded = total_refunded_cents(conn, &intent.id)?;
    Ok((captured - refunded).max(0))
}

/// Merchant-wide aggregate: `net = charges - |refunds| - fees`.
pub fn totals(conn: &Connection, merchant_id: &str) -> Result<LedgerTotals> {
    let charges_total = queries::sum_ledger_entries(conn, merchant_id, LedgerEntryType::Charge)?;
    let refunds_total =
        queries::sum_ledger_entries(conn, merchant_id, LedgerEntryType::Refund)?.abs();
    let fees_total = queries::sum_ledger_entries(conn, merchant_id, LedgerEntryType::Fee)?;
    Ok(LedgerTotals {
        charges_total,
        refunds_total,
        fees_total,
        net: charges_total - refunds_total - fees_total,
    })
}
