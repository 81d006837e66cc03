use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Kind of processor action a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Authorize,
    Capture,
    Void,
    Refund,
}

impl TransactionKind {
    /// Failure code and message recorded when the processor declines.
    pub fn decline_reason(&self) -> (&'static str, &'static str) {
        match self {
            Self::Authorize => ("insufficient_funds", "Insufficient funds"),
            Self::Capture => ("capture_failed", "Capture failed"),
            Self::Void => ("void_failed", "Void failed"),
            Self::Refund => ("refund_failed", "Refund failed"),
        }
    }
}

pub const TIMEOUT_FAILURE_CODE: &str = "timeout";
pub const TIMEOUT_FAILURE_MESSAGE: &str = "Processor request timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    Failed,
}

/// One attempted processor action and its outcome. Never updated after insert.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: String,
    pub payment_intent_id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount_cents: i64,
    pub processor_ref: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: i64,
}

impl Transaction {
    pub fn succeeded(&self) -> bool {
        self.status == TransactionStatus::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub payment_intent_id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount_cents: i64,
    pub processor_ref: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}
