use axum::extract::State;
use serde_json::{Value, json};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::metrics;
use crate::middleware::AuthedMerchant;

/// GET /api/v1/merchants/me
pub async fn get_current_merchant(merchant: AuthedMerchant) -> Result<Json<Value>> {
    Ok(Json(json!({ "data": merchant.0 })))
}

/// GET /api/v1/metrics
pub async fn get_metrics(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let metrics = metrics::compute(&conn, merchant.id())?;
    Ok(Json(json!({ "data": metrics })))
}
