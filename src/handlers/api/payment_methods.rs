use axum::{extract::State, http::StatusCode};
use rusqlite::TransactionBehavior;
use serde_json::{Value, json};

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path};
use crate::id;
use crate::middleware::AuthedMerchant;
use crate::models::CreatePaymentMethod;

/// POST /api/v1/customers/{customer_id}/payment_methods
pub async fn create_payment_method(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Path(customer_id): Path<String>,
    Json(input): Json<CreatePaymentMethod>,
) -> Result<(StatusCode, Json<Value>)> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let customer = queries::get_customer(&tx, merchant.id(), &customer_id)?
        .ok_or_else(|| AppError::NotFound(msg::CUSTOMER_NOT_FOUND.into()))?;
    input.validate().map_err(AppError::Validation)?;

    let payment_method =
        queries::create_payment_method(&tx, &customer.id, &input, &id::payment_method_token())?;
    AuditLogBuilder::new(&tx, &ctx)
        .merchant(merchant.id())
        .action(AuditAction::PaymentMethodCreated)
        .resource("payment_method", &payment_method.id)
        .metadata(json!({ "customer_id": customer.id }))
        .save()?;
    tx.commit()?;

    Ok((StatusCode::CREATED, Json(json!({ "data": payment_method }))))
}

/// GET /api/v1/customers/{customer_id}/payment_methods
pub async fn list_payment_methods(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Path(customer_id): Path<String>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let customer = queries::get_customer(&conn, merchant.id(), &customer_id)?
        .ok_or_else(|| AppError::NotFound(msg::CUSTOMER_NOT_FOUND.into()))?;
    let methods = queries::list_payment_methods(&conn, &customer.id)?;
    Ok(Json(json!({ "data": methods })))
}
