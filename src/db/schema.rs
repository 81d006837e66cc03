use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Merchants (tenant boundary). API keys are stored only as digests.
        CREATE TABLE IF NOT EXISTS merchants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            api_key_digest TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            password_digest TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            merchant_id TEXT NOT NULL REFERENCES merchants(id),
            email TEXT NOT NULL,
            name TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(merchant_id, email)
        );
        CREATE INDEX IF NOT EXISTS idx_customers_merchant ON customers(merchant_id, created_at);

        CREATE TABLE IF NOT EXISTS payment_methods (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customers(id),
            method_type TEXT NOT NULL CHECK (method_type IN ('card')),
            token TEXT NOT NULL UNIQUE,
            last4 TEXT,
            brand TEXT,
            exp_month INTEGER,
            exp_year INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payment_methods_customer ON payment_methods(customer_id);

        -- Payment intents: status is only advanced by the state machine
        CREATE TABLE IF NOT EXISTS payment_intents (
            id TEXT PRIMARY KEY,
            merchant_id TEXT NOT NULL REFERENCES merchants(id),
            customer_id TEXT NOT NULL REFERENCES customers(id),
            payment_method_id TEXT REFERENCES payment_methods(id),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'created'
                CHECK (status IN ('created', 'authorized', 'captured', 'canceled', 'failed')),
            dispute_status TEXT NOT NULL DEFAULT 'none' CHECK (dispute_status IN ('none', 'open')),
            idempotency_key TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(merchant_id, idempotency_key)
        );
        CREATE INDEX IF NOT EXISTS idx_payment_intents_merchant ON payment_intents(merchant_id, created_at);

        -- Transactions: append-only, one row per attempted processor action
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            payment_intent_id TEXT NOT NULL REFERENCES payment_intents(id),
            kind TEXT NOT NULL CHECK (kind IN ('authorize', 'capture', 'void', 'refund')),
            status TEXT NOT NULL CHECK (status IN ('succeeded', 'failed')),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            processor_ref TEXT NOT NULL UNIQUE,
            failure_code TEXT,
            failure_message TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_intent ON transactions(payment_intent_id, kind, status);

        -- Ledger: append-only signed entries (charges/fees positive, refunds negative)
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            merchant_id TEXT NOT NULL REFERENCES merchants(id),
            transaction_id TEXT REFERENCES transactions(id),
            entry_type TEXT NOT NULL CHECK (entry_type IN ('charge', 'refund', 'fee')),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_entries_merchant ON ledger_entries(merchant_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_ledger_entries_transaction ON ledger_entries(transaction_id);

        -- Idempotency records: the unique triple is the only concurrency primitive
        CREATE TABLE IF NOT EXISTS idempotency_records (
            id TEXT PRIMARY KEY,
            merchant_id TEXT NOT NULL REFERENCES merchants(id),
            idempotency_key TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            request_hash TEXT NOT NULL,
            state TEXT NOT NULL CHECK (state IN ('pending', 'completed')),
            response_body TEXT,
            response_status INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(merchant_id, idempotency_key, endpoint)
        );

        -- Webhook events (outbound and received)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            merchant_id TEXT REFERENCES merchants(id),
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            signature TEXT NOT NULL,
            delivery_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (delivery_status IN ('pending', 'succeeded', 'failed')),
            attempts INTEGER NOT NULL DEFAULT 0,
            delivered_at INTEGER,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_status ON webhook_events(delivery_status);
        CREATE INDEX IF NOT EXISTS idx_webhook_events_merchant ON webhook_events(merchant_id, event_type);

        -- Audit logs: append-only
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            merchant_id TEXT REFERENCES merchants(id),
            actor_type TEXT NOT NULL CHECK (actor_type IN ('merchant', 'processor', 'system')),
            actor_id TEXT,
            action TEXT NOT NULL,
            auditable_type TEXT NOT NULL,
            auditable_id TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_merchant ON audit_logs(merchant_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_auditable ON audit_logs(auditable_type, auditable_id);
        "#,
    )?;

    Ok(())
}
