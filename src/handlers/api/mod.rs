mod account;
mod customers;
mod ledger;
mod payment_intents;
mod payment_methods;
mod refunds;
mod webhook_events;

pub use account::*;
pub use customers::*;
pub use ledger::*;
pub use payment_intents::*;
pub use payment_methods::*;
pub use refunds::*;
pub use webhook_events::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::merchant_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/merchants/me", get(get_current_merchant))
        .route("/api/v1/metrics", get(get_metrics))
        // Customers and their payment methods
        .route("/api/v1/customers", post(create_customer).get(list_customers))
        .route("/api/v1/customers/{id}", get(get_customer))
        .route(
            "/api/v1/customers/{customer_id}/payment_methods",
            post(create_payment_method).get(list_payment_methods),
        )
        // Payment intents and state-machine operations
        .route(
            "/api/v1/payment_intents",
            post(create_payment_intent).get(list_payment_intents),
        )
        .route("/api/v1/payment_intents/{id}", get(get_payment_intent))
        .route("/api/v1/payment_intents/{id}/authorize", post(authorize_payment_intent))
        .route("/api/v1/payment_intents/{id}/capture", post(capture_payment_intent))
        .route("/api/v1/payment_intents/{id}/void", post(void_payment_intent))
        .route("/api/v1/payment_intents/{id}/refunds", post(create_refund))
        // Read models
        .route("/api/v1/ledger", get(get_ledger))
        .route("/api/v1/webhook_events", get(list_webhook_events))
        .layer(middleware::from_fn_with_state(state, merchant_auth))
}
