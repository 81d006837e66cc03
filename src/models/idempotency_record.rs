use serde::Serialize;
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum IdempotencyState {
    Pending,
    Completed,
}

/// Cached outcome of a side-effecting request, unique per (merchant, key, endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct IdempotencyRecord {
    pub id: String,
    pub merchant_id: String,
    pub idempotency_key: String,
    pub endpoint: String,
    pub request_hash: String,
    pub state: IdempotencyState,
    pub response_body: Option<String>,
    pub response_status: Option<u16>,
    pub created_at: i64,
    pub updated_at: i64,
}
