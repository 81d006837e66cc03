use axum::extract::State;
use serde_json::{Value, json};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(Json(json!({ "status": "ok" })))
}
