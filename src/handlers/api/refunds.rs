use axum::extract::State;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{OptionalJson, Path};
use crate::idempotency::OperationResponse;
use crate::middleware::AuthedMerchant;
use crate::payments;

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Omit to refund everything still refundable.
    pub amount_cents: Option<i64>,
    pub idempotency_key: Option<String>,
}

/// POST /api/v1/payment_intents/{id}/refunds
pub async fn create_refund(
    State(state): State<AppState>,
    ctx: RequestContext,
    merchant: AuthedMerchant,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<RefundRequest>,
) -> Result<OperationResponse> {
    payments::refund(
        &state,
        &ctx,
        merchant.id(),
        &id,
        body.amount_cents,
        body.idempotency_key.as_deref(),
    )
    .await
}
