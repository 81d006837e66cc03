use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::RequestContext;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, OptionalJson, Path, Query};
use crate::idempotency::OperationResponse;
use crate::middleware::AuthedMerchant;
use crate::models::{CreatePaymentIntent, PaymentIntentView};
use crate::pagination::{Paginated, PaginationQuery};
use crate::payments;

/// Body of `/authorize`, `/capture` and `/void`. May be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct OperationRequest {
    pub idempotency_key: Option<String>,
}

/// POST /api/v1/payment_intents
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Json(input): Json<CreatePaymentIntent>,
) -> Result<OperationResponse> {
    payments::create_payment_intent(&state, &ctx, merchant.id(), input).await
}

/// GET /api/v1/payment_intents
pub async fn list_payment_intents(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<PaymentIntentView>>> {
    let conn = state.db.get()?;
    let (views, total) =
        payments::list_intent_views(&conn, merchant.id(), page.limit(), page.offset())?;
    Ok(Json(Paginated::new(views, total, &page)))
}

/// GET /api/v1/payment_intents/{id}
pub async fn get_payment_intent(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let view = payments::get_intent_view(&conn, merchant.id(), &id)?;
    Ok(Json(json!({ "data": view })))
}

/// POST /api/v1/payment_intents/{id}/authorize
pub async fn authorize_payment_intent(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<OperationRequest>,
) -> Result<OperationResponse> {
    payments::authorize(&state, &ctx, merchant.id(), &id, body.idempotency_key.as_deref()).await
}

/// POST /api/v1/payment_intents/{id}/capture
pub async fn capture_payment_intent(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<OperationRequest>,
) -> Result<OperationResponse> {
    payments::capture(&state, &ctx, merchant.id(), &id, body.idempotency_key.as_deref()).await
}

/// POST /api/v1/payment_intents/{id}/void
pub async fn void_payment_intent(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<OperationRequest>,
) -> Result<OperationResponse> {
    payments::void(&state, &ctx, merchant.id(), &id, body.idempotency_key.as_deref()).await
}
