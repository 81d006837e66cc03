pub mod api;
pub mod public;
pub mod webhooks;

use axum::{Router, middleware};

use crate::db::AppState;
use crate::middleware::request_id;

/// Full HTTP surface. `X-Request-ID` handling wraps every route.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Bootstrap and health (no auth)
        .merge(public::router())
        // Processor callbacks (signature auth)
        .merge(webhooks::router())
        // Merchant API (X-API-KEY auth)
        .merge(api::router(state.clone()))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}
