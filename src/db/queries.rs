use chrono::Utc;
use rusqlite::{Connection, ErrorCode, params};

use crate::crypto::hash_secret;
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    AUDIT_LOG_COLS, CUSTOMER_COLS, IDEMPOTENCY_RECORD_COLS, LEDGER_ENTRY_COLS, MERCHANT_COLS,
    PAYMENT_INTENT_COLS, PAYMENT_METHOD_COLS, TRANSACTION_COLS, WEBHOOK_EVENT_COLS, query_all,
    query_one,
};

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

/// True when the error is a UNIQUE/CHECK/FK constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn count(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

// ============ Merchants ============

pub fn create_merchant(
    conn: &Connection,
    name: &str,
    api_key: &str,
    email: Option<&str>,
    password_digest: Option<&str>,
) -> Result<Merchant> {
    let id = EntityType::Merchant.gen_id();
    let now = now();
    let digest = hash_secret(api_key);

    conn.execute(
        "INSERT INTO merchants (id, name, api_key_digest, email, password_digest, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)",
        params![&id, name, &digest, email, password_digest, now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Validation("Email has already been taken".into())
        } else {
            e.into()
        }
    })?;

    Ok(Merchant {
        id,
        name: name.to_string(),
        api_key_digest: digest,
        email: email.map(String::from),
        password_digest: password_digest.map(String::from),
        status: MerchantStatus::Active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_merchant_by_id(conn: &Connection, id: &str) -> Result<Option<Merchant>> {
    query_one(
        conn,
        &format!("SELECT {} FROM merchants WHERE id = ?1", MERCHANT_COLS),
        &[&id],
    )
}

/// Resolve a plaintext API key to its merchant via the stored digest.
pub fn get_merchant_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Merchant>> {
    let digest = hash_secret(api_key);
    query_one(
        conn,
        &format!("SELECT {} FROM merchants WHERE api_key_digest = ?1", MERCHANT_COLS),
        &[&digest],
    )
}

pub fn count_merchants(conn: &Connection) -> Result<i64> {
    count(conn, "SELECT COUNT(*) FROM merchants", &[])
}

// ============ Customers ============

pub fn create_customer(
    conn: &Connection,
    merchant_id: &str,
    email: &str,
    name: Option<&str>,
) -> Result<Customer> {
    let id = EntityType::Customer.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO customers (id, merchant_id, email, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, merchant_id, email, name, now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Validation("Email has already been taken".into())
        } else {
            e.into()
        }
    })?;

    Ok(Customer {
        id,
        merchant_id: merchant_id.to_string(),
        email: email.to_string(),
        name: name.map(String::from),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_customer(conn: &Connection, merchant_id: &str, id: &str) -> Result<Option<Customer>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM customers WHERE id = ?1 AND merchant_id = ?2",
            CUSTOMER_COLS
        ),
        &[&id, &merchant_id],
    )
}

pub fn list_customers(
    conn: &Connection,
    merchant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Customer>, i64)> {
    let total = count(
        conn,
        "SELECT COUNT(*) FROM customers WHERE merchant_id = ?1",
        &[&merchant_id],
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM customers WHERE merchant_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            CUSTOMER_COLS
        ),
        &[&merchant_id, &limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Payment Methods ============

pub fn create_payment_method(
    conn: &Connection,
    customer_id: &str,
    input: &CreatePaymentMethod,
    token: &str,
) -> Result<PaymentMethod> {
    let id = EntityType::PaymentMethod.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payment_methods (id, customer_id, method_type, token, last4, brand, exp_month, exp_year, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            customer_id,
            &input.method_type,
            token,
            &input.last4,
            &input.brand,
            input.exp_month,
            input.exp_year,
            now
        ],
    )?;

    Ok(PaymentMethod {
        id,
        customer_id: customer_id.to_string(),
        method_type: input.method_type.clone(),
        token: token.to_string(),
        last4: input.last4.clone(),
        brand: input.brand.clone(),
        exp_month: input.exp_month,
        exp_year: input.exp_year,
        created_at: now,
    })
}

pub fn get_payment_method_for_customer(
    conn: &Connection,
    customer_id: &str,
    id: &str,
) -> Result<Option<PaymentMethod>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_methods WHERE id = ?1 AND customer_id = ?2",
            PAYMENT_METHOD_COLS
        ),
        &[&id, &customer_id],
    )
}

pub fn list_payment_methods(conn: &Connection, customer_id: &str) -> Result<Vec<PaymentMethod>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_methods WHERE customer_id = ?1 ORDER BY created_at DESC, rowid DESC",
            PAYMENT_METHOD_COLS
        ),
        &[&customer_id],
    )
}

// ============ Payment Intents ============

#[derive(Debug, Clone)]
pub struct NewPaymentIntent<'a> {
    pub merchant_id: &'a str,
    pub customer_id: &'a str,
    pub payment_method_id: Option<&'a str>,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub idempotency_key: Option<&'a str>,
    pub metadata: &'a serde_json::Value,
}

pub fn create_payment_intent(conn: &Connection, input: &NewPaymentIntent) -> Result<PaymentIntent> {
    let id = EntityType::PaymentIntent.gen_id();
    let now = now();
    let metadata = serde_json::to_string(input.metadata)?;

    conn.execute(
        "INSERT INTO payment_intents (id, merchant_id, customer_id, payment_method_id, amount_cents, currency, status, dispute_status, idempotency_key, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'created', 'none', ?7, ?8, ?9, ?9)",
        params![
            &id,
            input.merchant_id,
            input.customer_id,
            input.payment_method_id,
            input.amount_cents,
            input.currency,
            input.idempotency_key,
            &metadata,
            now
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Validation("Idempotency key has already been taken".into())
        } else {
            e.into()
        }
    })?;

    Ok(PaymentIntent {
        id,
        merchant_id: input.merchant_id.to_string(),
        customer_id: input.customer_id.to_string(),
        payment_method_id: input.payment_method_id.map(String::from),
        amount_cents: input.amount_cents,
        currency: input.currency.to_string(),
        status: PaymentIntentStatus::Created,
        dispute_status: DisputeStatus::None,
        idempotency_key: input.idempotency_key.map(String::from),
        metadata: input.metadata.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Fetch an intent scoped to its owning merchant.
pub fn get_payment_intent(
    conn: &Connection,
    merchant_id: &str,
    id: &str,
) -> Result<Option<PaymentIntent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_intents WHERE id = ?1 AND merchant_id = ?2",
            PAYMENT_INTENT_COLS
        ),
        &[&id, &merchant_id],
    )
}

pub fn list_payment_intents(
    conn: &Connection,
    merchant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PaymentIntent>, i64)> {
    let total = count(
        conn,
        "SELECT COUNT(*) FROM payment_intents WHERE merchant_id = ?1",
        &[&merchant_id],
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_intents WHERE merchant_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            PAYMENT_INTENT_COLS
        ),
        &[&merchant_id, &limit, &offset],
    )?;
    Ok((items, total))
}

/// Compare-and-set the intent status. Returns false if the intent was not in `from`.
pub fn transition_payment_intent(
    conn: &Connection,
    id: &str,
    from: &[PaymentIntentStatus],
    to: PaymentIntentStatus,
) -> Result<bool> {
    let allowed = from
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let affected = conn.execute(
        &format!(
            "UPDATE payment_intents SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
            allowed
        ),
        params![to.as_ref(), now(), id],
    )?;
    Ok(affected > 0)
}

pub fn set_dispute_status(conn: &Connection, id: &str, status: DisputeStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_intents SET dispute_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Transactions ============

pub fn create_transaction(conn: &Connection, input: &NewTransaction) -> Result<Transaction> {
    let id = EntityType::Transaction.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO transactions (id, payment_intent_id, kind, status, amount_cents, processor_ref, failure_code, failure_message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.payment_intent_id,
            input.kind.as_ref(),
            input.status.as_ref(),
            input.amount_cents,
            &input.processor_ref,
            &input.failure_code,
            &input.failure_message,
            now
        ],
    )?;

    Ok(Transaction {
        id,
        payment_intent_id: input.payment_intent_id.clone(),
        kind: input.kind,
        status: input.status,
        amount_cents: input.amount_cents,
        processor_ref: input.processor_ref.clone(),
        failure_code: input.failure_code.clone(),
        failure_message: input.failure_message.clone(),
        created_at: now,
    })
}

pub fn list_transactions_for_intent(
    conn: &Connection,
    payment_intent_id: &str,
) -> Result<Vec<Transaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE payment_intent_id = ?1 ORDER BY created_at, rowid",
            TRANSACTION_COLS
        ),
        &[&payment_intent_id],
    )
}

/// Sum of succeeded transaction amounts of one kind for an intent.
pub fn sum_succeeded_amount(
    conn: &Connection,
    payment_intent_id: &str,
    kind: TransactionKind,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions
         WHERE payment_intent_id = ?1 AND kind = ?2 AND status = 'succeeded'",
        params![payment_intent_id, kind.as_ref()],
        |row| row.get(0),
    )?)
}

pub fn has_succeeded_transaction(
    conn: &Connection,
    payment_intent_id: &str,
    kind: TransactionKind,
) -> Result<bool> {
    let n = count(
        conn,
        "SELECT COUNT(*) FROM transactions WHERE payment_intent_id = ?1 AND kind = ?2 AND status = 'succeeded'",
        &[&payment_intent_id, &kind.as_ref()],
    )?;
    Ok(n > 0)
}

/// Count a merchant's transactions of one kind, optionally filtered by status.
pub fn count_merchant_transactions(
    conn: &Connection,
    merchant_id: &str,
    kind: TransactionKind,
    status: Option<TransactionStatus>,
) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM transactions t JOIN payment_intents p ON p.id = t.payment_intent_id
         WHERE p.merchant_id = ?1 AND t.kind = ?2 AND (?3 IS NULL OR t.status = ?3)",
        &[&merchant_id, &kind.as_ref(), &status.map(|s| s.as_ref().to_string())],
    )
}

/// Sum of a merchant's succeeded transaction amounts of one kind.
pub fn sum_merchant_succeeded_amount(
    conn: &Connection,
    merchant_id: &str,
    kind: TransactionKind,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(t.amount_cents), 0) FROM transactions t
         JOIN payment_intents p ON p.id = t.payment_intent_id
         WHERE p.merchant_id = ?1 AND t.kind = ?2 AND t.status = 'succeeded'",
        params![merchant_id, kind.as_ref()],
        |row| row.get(0),
    )?)
}

// ============ Ledger ============

pub fn insert_ledger_entry(conn: &Connection, input: &NewLedgerEntry) -> Result<LedgerEntry> {
    let id = EntityType::LedgerEntry.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO ledger_entries (id, merchant_id, transaction_id, entry_type, amount_cents, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.merchant_id,
            &input.transaction_id,
            input.entry_type.as_ref(),
            input.amount_cents,
            &input.currency,
            now
        ],
    )?;

    Ok(LedgerEntry {
        id,
        merchant_id: input.merchant_id.clone(),
        transaction_id: input.transaction_id.clone(),
        entry_type: input.entry_type,
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        created_at: now,
    })
}

pub fn sum_ledger_entries(
    conn: &Connection,
    merchant_id: &str,
    entry_type: LedgerEntryType,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM ledger_entries WHERE merchant_id = ?1 AND entry_type = ?2",
        params![merchant_id, entry_type.as_ref()],
        |row| row.get(0),
    )?)
}

pub fn list_ledger_entries(
    conn: &Connection,
    merchant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<LedgerEntry>, i64)> {
    let total = count(
        conn,
        "SELECT COUNT(*) FROM ledger_entries WHERE merchant_id = ?1",
        &[&merchant_id],
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM ledger_entries WHERE merchant_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            LEDGER_ENTRY_COLS
        ),
        &[&merchant_id, &limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Idempotency Records ============

/// Insert a pending placeholder. Returns `Ok(None)` if the triple already exists.
pub fn insert_idempotency_placeholder(
    conn: &Connection,
    merchant_id: &str,
    idempotency_key: &str,
    endpoint: &str,
    request_hash: &str,
) -> Result<Option<String>> {
    let id = EntityType::IdempotencyRecord.gen_id();
    let now = now();

    match conn.execute(
        "INSERT INTO idempotency_records (id, merchant_id, idempotency_key, endpoint, request_hash, state, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
        params![&id, merchant_id, idempotency_key, endpoint, request_hash, now],
    ) {
        Ok(_) => Ok(Some(id)),
        Err(e) if is_constraint_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_idempotency_record(
    conn: &Connection,
    merchant_id: &str,
    idempotency_key: &str,
    endpoint: &str,
) -> Result<Option<IdempotencyRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM idempotency_records
             WHERE merchant_id = ?1 AND idempotency_key = ?2 AND endpoint = ?3",
            IDEMPOTENCY_RECORD_COLS
        ),
        &[&merchant_id, &idempotency_key, &endpoint],
    )
}

/// Finalize a pending record. A completed record is never overwritten.
pub fn complete_idempotency_record(
    conn: &Connection,
    id: &str,
    response_body: &str,
    response_status: u16,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE idempotency_records
         SET state = 'completed', response_body = ?1, response_status = ?2, updated_at = ?3
         WHERE id = ?4 AND state = 'pending'",
        params![response_body, response_status, now(), id],
    )?;
    Ok(affected > 0)
}

/// Drop a placeholder whose request failed before producing a response.
pub fn delete_pending_idempotency_record(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM idempotency_records WHERE id = ?1 AND state = 'pending'",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Webhook Events ============

pub fn create_webhook_event(conn: &Connection, input: &NewWebhookEvent) -> Result<WebhookEvent> {
    let id = EntityType::WebhookEvent.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO webhook_events (id, merchant_id, event_type, payload, signature, delivery_status, attempts, delivered_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
        params![
            &id,
            &input.merchant_id,
            &input.event_type,
            &input.payload,
            &input.signature,
            input.delivery_status.as_ref(),
            input.delivered_at,
            now
        ],
    )?;

    Ok(WebhookEvent {
        id,
        merchant_id: input.merchant_id.clone(),
        event_type: input.event_type.clone(),
        payload: input.payload.clone(),
        signature: input.signature.clone(),
        delivery_status: input.delivery_status,
        attempts: 0,
        delivered_at: input.delivered_at,
        last_error: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_webhook_event(conn: &Connection, id: &str) -> Result<Option<WebhookEvent>> {
    query_one(
        conn,
        &format!("SELECT {} FROM webhook_events WHERE id = ?1", WEBHOOK_EVENT_COLS),
        &[&id],
    )
}

pub fn list_webhook_events(conn: &Connection, merchant_id: &str) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE merchant_id = ?1 ORDER BY created_at DESC, rowid DESC",
            WEBHOOK_EVENT_COLS
        ),
        &[&merchant_id],
    )
}

pub fn list_pending_webhook_event_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM webhook_events WHERE delivery_status = 'pending' ORDER BY created_at, rowid",
    )?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Increment the attempt counter of a pending event and return the new value.
pub fn increment_webhook_attempts(conn: &Connection, id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "UPDATE webhook_events SET attempts = attempts + 1, updated_at = ?1
         WHERE id = ?2 RETURNING attempts",
        params![now(), id],
        |row| row.get(0),
    )?)
}

pub fn mark_webhook_succeeded(conn: &Connection, id: &str) -> Result<()> {
    let now = now();
    conn.execute(
        "UPDATE webhook_events SET delivery_status = 'succeeded', delivered_at = ?1, last_error = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn mark_webhook_failed(conn: &Connection, id: &str, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE webhook_events SET delivery_status = 'failed', last_error = ?1, updated_at = ?2 WHERE id = ?3",
        params![error, now(), id],
    )?;
    Ok(())
}

pub fn record_webhook_error(conn: &Connection, id: &str, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE webhook_events SET last_error = ?1, updated_at = ?2 WHERE id = ?3",
        params![error, now(), id],
    )?;
    Ok(())
}

pub fn count_webhook_events(
    conn: &Connection,
    merchant_id: &str,
    event_type: Option<&str>,
    status: Option<DeliveryStatus>,
) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM webhook_events
         WHERE merchant_id = ?1
           AND (?2 IS NULL OR event_type = ?2)
           AND (?3 IS NULL OR delivery_status = ?3)",
        &[&merchant_id, &event_type, &status.map(|s| s.as_ref().to_string())],
    )
}

// ============ Audit Logs ============

pub fn create_audit_log(conn: &Connection, input: &NewAuditLog) -> Result<AuditLog> {
    let id = EntityType::AuditLog.gen_id();
    let now = now();
    let metadata = serde_json::to_string(&input.metadata)?;

    conn.execute(
        "INSERT INTO audit_logs (id, merchant_id, actor_type, actor_id, action, auditable_type, auditable_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.merchant_id,
            input.actor_type.as_ref(),
            &input.actor_id,
            &input.action,
            &input.auditable_type,
            &input.auditable_id,
            &metadata,
            now
        ],
    )?;

    Ok(AuditLog {
        id,
        merchant_id: input.merchant_id.clone(),
        actor_type: input.actor_type,
        actor_id: input.actor_id.clone(),
        action: input.action.clone(),
        auditable_type: input.auditable_type.clone(),
        auditable_id: input.auditable_id.clone(),
        metadata: input.metadata.clone(),
        created_at: now,
    })
}

pub fn list_audit_logs_for(
    conn: &Connection,
    auditable_type: &str,
    auditable_id: &str,
) -> Result<Vec<AuditLog>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs WHERE auditable_type = ?1 AND auditable_id = ?2 ORDER BY created_at, rowid",
            AUDIT_LOG_COLS
        ),
        &[&auditable_type, &auditable_id],
    )
}

pub fn list_audit_logs(conn: &Connection, merchant_id: &str) -> Result<Vec<AuditLog>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs WHERE merchant_id = ?1 ORDER BY created_at DESC, rowid DESC",
            AUDIT_LOG_COLS
        ),
        &[&merchant_id],
    )
}

pub fn count_payment_intents(conn: &Connection, merchant_id: &str) -> Result<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM payment_intents WHERE merchant_id = ?1",
        &[&merchant_id],
    )
}
