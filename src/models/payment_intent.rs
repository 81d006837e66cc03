use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    Created,
    Authorized,
    Captured,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisputeStatus {
    None,
    Open,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub merchant_id: String,
    pub customer_id: String,
    pub payment_method_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub dispute_status: DisputeStatus,
    pub idempotency_key: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntent {
    pub customer_id: String,
    pub payment_method_id: Option<String>,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CreatePaymentIntent {
    /// Upper-cased currency code, defaulting to USD.
    pub fn normalized_currency(&self) -> Result<String, &'static str> {
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("USD")
            .to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("currency must be a 3-letter code");
        }
        Ok(currency)
    }
}

/// Serialized form of an intent, with ledger-derived balances.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentView {
    #[serde(flatten)]
    pub intent: PaymentIntent,
    pub refundable_cents: i64,
    pub total_refunded_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
}
