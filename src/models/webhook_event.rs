use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

pub const EVENT_TRANSACTION_SUCCEEDED: &str = "transaction.succeeded";
pub const EVENT_TRANSACTION_FAILED: &str = "transaction.failed";
pub const EVENT_CHARGEBACK_OPENED: &str = "chargeback.opened";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    pub merchant_id: Option<String>,
    pub event_type: String,
    /// Exact JSON text that was signed and is sent on delivery.
    pub payload: String,
    pub signature: String,
    pub delivery_status: DeliveryStatus,
    pub attempts: i64,
    pub delivered_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub merchant_id: Option<String>,
    pub event_type: String,
    pub payload: String,
    pub signature: String,
    pub delivery_status: DeliveryStatus,
    pub delivered_at: Option<i64>,
}
