//! Hashing and signing primitives.
//!
//! - API keys are stored as salted SHA-256 digests and looked up by digest.
//! - Merchant passwords are Argon2id hashes.
//! - Webhook payloads are signed with HMAC-SHA256 (lowercase hex) and verified in
//!   constant time.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Hash a secret for database lookups (API keys).
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"paygate-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Plain SHA-256 hex digest, used for idempotency request fingerprints.
pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// HMAC-SHA256 of `payload`, lowercase hex.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid HMAC key".into()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare a provided hex signature against the HMAC of `payload`.
pub fn verify_signature(secret: &str, payload: &[u8], provided: &str) -> Result<bool> {
    let expected = sign_payload(secret, payload)?;
    let provided = provided.trim();
    if provided.len() != expected.len() {
        return Ok(false);
    }
    Ok(provided.as_bytes().ct_eq(expected.as_bytes()).into())
}
