//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a JSON text column.
fn parse_json(row: &Row, col: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const MERCHANT_COLS: &str =
    "id, name, api_key_digest, email, password_digest, status, created_at, updated_at";

pub const CUSTOMER_COLS: &str = "id, merchant_id, email, name, created_at, updated_at";

pub const PAYMENT_METHOD_COLS: &str =
    "id, customer_id, method_type, token, last4, brand, exp_month, exp_year, created_at";

pub const PAYMENT_INTENT_COLS: &str = "id, merchant_id, customer_id, payment_method_id, amount_cents, currency, status, dispute_status, idempotency_key, metadata, created_at, updated_at";

pub const TRANSACTION_COLS: &str = "id, payment_intent_id, kind, status, amount_cents, processor_ref, failure_code, failure_message, created_at";

pub const LEDGER_ENTRY_COLS: &str =
    "id, merchant_id, transaction_id, entry_type, amount_cents, currency, created_at";

pub const IDEMPOTENCY_RECORD_COLS: &str = "id, merchant_id, idempotency_key, endpoint, request_hash, state, response_body, response_status, created_at, updated_at";

pub const WEBHOOK_EVENT_COLS: &str = "id, merchant_id, event_type, payload, signature, delivery_status, attempts, delivered_at, last_error, created_at, updated_at";

pub const AUDIT_LOG_COLS: &str = "id, merchant_id, actor_type, actor_id, action, auditable_type, auditable_id, metadata, created_at";

// ============ FromRow Implementations ============

impl FromRow for Merchant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Merchant {
            id: row.get(0)?,
            name: row.get(1)?,
            api_key_digest: row.get(2)?,
            email: row.get(3)?,
            password_digest: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Customer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Customer {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for PaymentMethod {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentMethod {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            method_type: row.get(2)?,
            token: row.get(3)?,
            last4: row.get(4)?,
            brand: row.get(5)?,
            exp_month: row.get(6)?,
            exp_year: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for PaymentIntent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentIntent {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            customer_id: row.get(2)?,
            payment_method_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            dispute_status: parse_enum(row, 7, "dispute_status")?,
            idempotency_key: row.get(8)?,
            metadata: parse_json(row, 9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            payment_intent_id: row.get(1)?,
            kind: parse_enum(row, 2, "kind")?,
            status: parse_enum(row, 3, "status")?,
            amount_cents: row.get(4)?,
            processor_ref: row.get(5)?,
            failure_code: row.get(6)?,
            failure_message: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for LedgerEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LedgerEntry {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            transaction_id: row.get(2)?,
            entry_type: parse_enum(row, 3, "entry_type")?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for IdempotencyRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(IdempotencyRecord {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            idempotency_key: row.get(2)?,
            endpoint: row.get(3)?,
            request_hash: row.get(4)?,
            state: parse_enum(row, 5, "state")?,
            response_body: row.get(6)?,
            response_status: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            event_type: row.get(2)?,
            payload: row.get(3)?,
            signature: row.get(4)?,
            delivery_status: parse_enum(row, 5, "delivery_status")?,
            attempts: row.get(6)?,
            delivered_at: row.get(7)?,
            last_error: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AuditLog {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            actor_type: parse_enum(row, 2, "actor_type")?,
            actor_id: row.get(3)?,
            action: row.get(4)?,
            auditable_type: row.get(5)?,
            auditable_id: row.get(6)?,
            metadata: parse_json(row, 7)?,
            created_at: row.get(8)?,
        })
    }
}
