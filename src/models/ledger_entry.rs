use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LedgerEntryType {
    Charge,
    Refund,
    /// Reserved for processor-fee accounting; no operation produces it yet.
    Fee,
}

/// Signed accounting record. Charges and fees are positive, refunds negative.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub merchant_id: String,
    pub transaction_id: Option<String>,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub merchant_id: String,
    pub transaction_id: Option<String>,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub currency: String,
}

/// Read-side aggregate over a merchant's ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerTotals {
    pub charges_total: i64,
    /// Magnitude of all refund entries.
    pub refunds_total: i64,
    pub fees_total: i64,
    pub net: i64,
}
