use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};

use crate::context::RequestContext;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::webhooks::{SIGNATURE_HEADER, receive_processor_event};

/// POST /api/v1/webhooks/processor
///
/// The raw body is handed to the core untouched; the signature covers its exact bytes.
pub async fn handle_processor_webhook(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let mut conn = state.db.get()?;
    let event = receive_processor_event(
        &mut conn,
        &ctx,
        &state.webhook.secret,
        &body,
        signature,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": {
                "id": event.id,
                "event_type": event.event_type,
                "status": "received",
            }
        })),
    ))
}
