mod processor;

pub use processor::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/webhooks/processor", post(handle_processor_webhook))
}
