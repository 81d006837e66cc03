//! Fixtures shared by the paygate integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;

pub use paygate::config::WebhookConfig;
pub use paygate::context::RequestContext;
pub use paygate::db::{AppState, DbPool, init_db, queries};
pub use paygate::error::AppError;
pub use paygate::idempotency::OperationResponse;
pub use paygate::models::*;
pub use paygate::processor::ScriptedProcessor;
pub use paygate::webhooks::{QueuedTask, RecordingQueue};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_paygate_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Single-connection in-memory pool. Every `get()` sees the same database.
pub fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(|c| {
        c.pragma_update(None, "foreign_keys", "ON")
    });
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to build test pool");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).expect("Failed to initialize schema");
    }
    pool
}

pub fn test_webhook_config() -> WebhookConfig {
    WebhookConfig {
        secret: TEST_WEBHOOK_SECRET.to_string(),
        ..WebhookConfig::default()
    }
}

/// App state wired to a scripted processor and a recording queue.
pub struct TestEnv {
    pub state: AppState,
    pub processor: Arc<ScriptedProcessor>,
    pub queue: Arc<RecordingQueue>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_processor(ScriptedProcessor::approve_all())
    }

    pub fn with_processor(processor: ScriptedProcessor) -> Self {
        Self::build(processor, Duration::from_secs(3), test_webhook_config())
    }

    pub fn build(
        processor: ScriptedProcessor,
        processor_timeout: Duration,
        webhook: WebhookConfig,
    ) -> Self {
        let processor = Arc::new(processor);
        let queue = Arc::new(RecordingQueue::new());
        let state = AppState {
            db: test_pool(),
            processor: processor.clone(),
            processor_timeout,
            webhook,
            queue: queue.clone(),
        };
        Self {
            state,
            processor,
            queue,
        }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get test connection")
    }

    pub fn app(&self) -> Router {
        paygate::handlers::app(self.state.clone())
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.conn();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    pub fn intent(&self, merchant: &TestMerchant, id: &str) -> PaymentIntent {
        let conn = self.conn();
        queries::get_payment_intent(&conn, &merchant.merchant.id, id)
            .unwrap()
            .expect("intent should exist")
    }

    pub fn transactions(&self, intent_id: &str) -> Vec<Transaction> {
        let conn = self.conn();
        queries::list_transactions_for_intent(&conn, intent_id).unwrap()
    }
}

/// A merchant with its plaintext key, one customer, and one card.
pub struct TestMerchant {
    pub merchant: Merchant,
    pub api_key: String,
    pub customer: Customer,
    pub payment_method: PaymentMethod,
}

impl TestMerchant {
    pub fn id(&self) -> &str {
        &self.merchant.id
    }
}

pub fn create_test_merchant(env: &TestEnv, name: &str) -> TestMerchant {
    let conn = env.conn();
    let api_key = paygate::id::api_key();
    let merchant = queries::create_merchant(&conn, name, &api_key, None, None)
        .expect("Failed to create test merchant");
    let customer = queries::create_customer(
        &conn,
        &merchant.id,
        &format!("buyer+{}@example.com", &api_key[..8]),
        Some("Test Buyer"),
    )
    .expect("Failed to create test customer");
    let payment_method = queries::create_payment_method(
        &conn,
        &customer.id,
        &CreatePaymentMethod {
            method_type: "card".into(),
            last4: Some("4242".into()),
            brand: Some("visa".into()),
            exp_month: Some(12),
            exp_year: Some(2099),
        },
        &paygate::id::payment_method_token(),
    )
    .expect("Failed to create test payment method");
    TestMerchant {
        merchant,
        api_key,
        customer,
        payment_method,
    }
}

/// Insert a `created` intent directly, bypassing the guard.
pub fn create_test_intent(env: &TestEnv, merchant: &TestMerchant, amount_cents: i64) -> PaymentIntent {
    let conn = env.conn();
    queries::create_payment_intent(
        &conn,
        &queries::NewPaymentIntent {
            merchant_id: merchant.id(),
            customer_id: &merchant.customer.id,
            payment_method_id: Some(&merchant.payment_method.id),
            amount_cents,
            currency: "USD",
            idempotency_key: None,
            metadata: &serde_json::json!({}),
        },
    )
    .expect("Failed to create test intent")
}

pub fn ctx() -> RequestContext {
    RequestContext::new("req_test")
}

pub fn body(resp: &OperationResponse) -> Value {
    resp.body_json().expect("response body should be JSON")
}

/// Drive the router with one request. Returns status, headers and parsed body.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    api_key: Option<&str>,
    json: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-KEY", key);
    }
    let request = match json {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, value)
}
