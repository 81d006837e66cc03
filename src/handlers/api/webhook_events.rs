use axum::extract::State;
use serde_json::{Value, json};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AuthedMerchant;

/// GET /api/v1/webhook_events
pub async fn list_webhook_events(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let events = queries::list_webhook_events(&conn, merchant.id())?;
    Ok(Json(json!({ "data": events })))
}
