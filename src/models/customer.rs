use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: String,
    pub merchant_id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomer {
    pub email: String,
    pub name: Option<String>,
}

/// Trim and lowercase an email address, rejecting obviously malformed input.
pub fn normalize_email(raw: &str) -> Result<String, &'static str> {
    let email = raw.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email is invalid");
    };
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
        || domain.contains('@')
    {
        return Err("Email is invalid");
    }
    Ok(email)
}

impl CreateCustomer {
    pub fn validated_email(&self) -> Result<String, &'static str> {
        normalize_email(&self.email)
    }
}
