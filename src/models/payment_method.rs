use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub const SUPPORTED_METHOD_TYPES: &[&str] = &["card"];

/// Stored card display data. The token is generated server-side.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethod {
    pub id: String,
    pub customer_id: String,
    pub method_type: String,
    pub token: String,
    pub last4: Option<String>,
    pub brand: Option<String>,
    pub exp_month: Option<i64>,
    pub exp_year: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentMethod {
    #[serde(default = "default_method_type")]
    pub method_type: String,
    pub last4: Option<String>,
    pub brand: Option<String>,
    pub exp_month: Option<i64>,
    pub exp_year: Option<i64>,
}

fn default_method_type() -> String {
    "card".to_string()
}

impl CreatePaymentMethod {
    pub fn validate(&self) -> Result<(), String> {
        if !SUPPORTED_METHOD_TYPES.contains(&self.method_type.as_str()) {
            return Err(format!(
                "method_type must be one of: {}",
                SUPPORTED_METHOD_TYPES.join(", ")
            ));
        }
        if let Some(last4) = &self.last4 {
            if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err("last4 must be exactly 4 digits".into());
            }
        }
        if let Some(month) = self.exp_month {
            if !(1..=12).contains(&month) {
                return Err("exp_month must be between 1 and 12".into());
            }
        }
        if let Some(year) = self.exp_year {
            let current = i64::from(chrono::Utc::now().year());
            if year < current {
                return Err(format!("exp_year must be {} or later", current));
            }
        }
        Ok(())
    }
}
