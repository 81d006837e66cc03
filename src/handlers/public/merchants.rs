use axum::{extract::State, http::StatusCode};
use rusqlite::TransactionBehavior;
use serde_json::{Value, json};

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::crypto::hash_password;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, OptionalJson};
use crate::id;
use crate::models::{CreateMerchant, MerchantWithKey, normalize_email};

const MIN_PASSWORD_LEN: usize = 8;

/// POST /api/v1/merchants
///
/// Bootstrap endpoint. The plaintext API key appears in this response only.
pub async fn create_merchant(
    State(state): State<AppState>,
    ctx: RequestContext,
    OptionalJson(input): OptionalJson<CreateMerchant>,
) -> Result<(StatusCode, Json<Value>)> {
    let name = match input.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        Some(_) => return Err(AppError::Validation("Name can't be blank".into())),
        None => format!("Merchant {}", &id::api_key()[..8]),
    };
    let email = match input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => Some(normalize_email(raw).map_err(|m| AppError::Validation(m.into()))?),
        None => None,
    };
    let password_digest = match input.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) if password.chars().count() < MIN_PASSWORD_LEN => {
            return Err(AppError::Validation(format!(
                "Password is too short (minimum is {} characters)",
                MIN_PASSWORD_LEN
            )));
        }
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let api_key = id::api_key();

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let merchant = queries::create_merchant(
        &tx,
        &name,
        &api_key,
        email.as_deref(),
        password_digest.as_deref(),
    )?;
    AuditLogBuilder::new(&tx, &ctx)
        .merchant(&merchant.id)
        .action(AuditAction::MerchantCreated)
        .resource("merchant", &merchant.id)
        .metadata(json!({ "name": merchant.name }))
        .save()?;
    tx.commit()?;

    tracing::info!(request_id = %ctx.request_id, merchant_id = %merchant.id, "Merchant created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": MerchantWithKey { merchant, api_key } })),
    ))
}
