use axum::{extract::State, http::StatusCode};
use rusqlite::TransactionBehavior;
use serde_json::{Value, json};

use crate::audit::{AuditAction, AuditLogBuilder};
use crate::context::RequestContext;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthedMerchant;
use crate::models::{CreateCustomer, Customer};
use crate::pagination::{Paginated, PaginationQuery};

/// POST /api/v1/customers
pub async fn create_customer(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Json(input): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Value>)> {
    let email = input
        .validated_email()
        .map_err(|m| AppError::Validation(m.into()))?;
    let name = input.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let customer = queries::create_customer(&tx, merchant.id(), &email, name)?;
    AuditLogBuilder::new(&tx, &ctx)
        .merchant(merchant.id())
        .action(AuditAction::CustomerCreated)
        .resource("customer", &customer.id)
        .save()?;
    tx.commit()?;

    Ok((StatusCode::CREATED, Json(json!({ "data": customer }))))
}

/// GET /api/v1/customers
pub async fn list_customers(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<Customer>>> {
    let conn = state.db.get()?;
    let (customers, total) =
        queries::list_customers(&conn, merchant.id(), page.limit(), page.offset())?;
    Ok(Json(Paginated::new(customers, total, &page)))
}

/// GET /api/v1/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let customer = queries::get_customer(&conn, merchant.id(), &id)?
        .ok_or_else(|| AppError::NotFound(msg::CUSTOMER_NOT_FOUND.into()))?;
    Ok(Json(json!({ "data": customer })))
}
