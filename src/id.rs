//! Prefixed ID generation for Paygate entities.
//!
//! Entity IDs use a `pg_` brand prefix: `pg_{entity}_{uuid_simple}` (32 hex chars).
//! Processor references and payment-method tokens carry the shorter `txn_` / `pm_`
//! prefixes that merchants see on receipts and card displays.

use rand::RngCore;
use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "pg_mer_", "pg_cus_", "pg_pm_", "pg_pi_", "pg_txn_", "pg_led_", "pg_idem_", "pg_evt_",
    "pg_aud_",
];

/// Cheap shape check to reject garbage ids before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };
    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Merchant,
    Customer,
    PaymentMethod,
    PaymentIntent,
    Transaction,
    LedgerEntry,
    IdempotencyRecord,
    WebhookEvent,
    AuditLog,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Merchant => "pg_mer",
            Self::Customer => "pg_cus",
            Self::PaymentMethod => "pg_pm",
            Self::PaymentIntent => "pg_pi",
            Self::Transaction => "pg_txn",
            Self::LedgerEntry => "pg_led",
            Self::IdempotencyRecord => "pg_idem",
            Self::WebhookEvent => "pg_evt",
            Self::AuditLog => "pg_aud",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Globally unique processor reference, e.g. `txn_3f9a...`.
pub fn processor_ref() -> String {
    format!("txn_{}", random_hex(16))
}

/// Server-generated display token for a payment method.
pub fn payment_method_token() -> String {
    format!("pm_{}", random_hex(16))
}

/// Plaintext merchant API key (64 hex chars). Only its digest is persisted.
pub fn api_key() -> String {
    random_hex(32)
}
