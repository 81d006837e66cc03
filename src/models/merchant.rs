use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MerchantStatus {
    Active,
    Inactive,
}

/// Tenant boundary. Every other entity is owned by exactly one merchant.
#[derive(Debug, Clone, Serialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key_digest: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_digest: Option<String>,
    pub status: MerchantStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Merchant {
    pub fn is_active(&self) -> bool {
        self.status == MerchantStatus::Active
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMerchant {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Returned once at signup. The plaintext key is never retrievable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantWithKey {
    #[serde(flatten)]
    pub merchant: Merchant,
    pub api_key: String,
}
