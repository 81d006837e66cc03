mod health;
mod merchants;

pub use health::*;
pub use merchants::*;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/merchants", post(create_merchant))
}
