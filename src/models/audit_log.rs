use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorType {
    Merchant,
    Processor,
    System,
}

/// Immutable record of a state-changing action.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: String,
    pub merchant_id: Option<String>,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub action: String,
    pub auditable_type: String,
    pub auditable_id: String,
    /// Always carries `request_id` and `timestamp`.
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub merchant_id: Option<String>,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub action: String,
    pub auditable_type: String,
    pub auditable_id: String,
    pub metadata: serde_json::Value,
}
