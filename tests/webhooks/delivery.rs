//! Delivery attempts against a local receiver.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};

#[path = "../common/mod.rs"]
mod common;
use common::*;

use paygate::crypto::verify_signature;
use paygate::payments;
use paygate::webhooks::{self, DeliveryOutcome};

#[derive(Clone, Default)]
struct Receiver {
    status: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(HeaderMap, Bytes)>>>,
}

async fn receive(State(rx): State<Receiver>, headers: HeaderMap, body: Bytes) -> StatusCode {
    rx.received.lock().unwrap().push((headers, body));
    StatusCode::from_u16(rx.status.load(Ordering::SeqCst)).unwrap()
}

/// Serve a receiver on an ephemeral port answering with `status`.
async fn spawn_receiver(status: u16) -> (String, Receiver) {
    let rx = Receiver::default();
    rx.status.store(status, Ordering::SeqCst);
    let app = Router::new()
        .route("/hooks", post(receive))
        .with_state(rx.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hooks", addr), rx)
}

async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/hooks", addr)
}

fn env_with_endpoint(url: Option<String>) -> TestEnv {
    let config = WebhookConfig {
        endpoint_url: url,
        connect_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_secs(2),
        ..test_webhook_config()
    };
    TestEnv::build(ScriptedProcessor::approve_all(), Duration::from_secs(3), config)
}

/// Authorize an intent and return the id of the event it produced.
async fn produce_event(env: &TestEnv) -> String {
    let m = create_test_merchant(env, "Deliveries");
    let pi = create_test_intent(env, &m, 1_234);
    payments::authorize(&env.state, &ctx(), m.id(), &pi.id, None).await.unwrap();
    env.queue.take().pop().unwrap().event_id
}

async fn deliver_once(env: &TestEnv, event_id: &str) -> DeliveryOutcome {
    let client = webhooks::http_client(&env.state.webhook).unwrap();
    webhooks::deliver(
        &env.state.db,
        &env.state.webhook,
        &client,
        env.queue.as_ref(),
        event_id,
    )
    .await
    .unwrap()
}

fn event(env: &TestEnv, id: &str) -> WebhookEvent {
    queries::get_webhook_event(&env.conn(), id).unwrap().unwrap()
}

#[tokio::test]
async fn test_successful_delivery_sends_signed_body() {
    let (url, rx) = spawn_receiver(200).await;
    let env = env_with_endpoint(Some(url));
    let event_id = produce_event(&env).await;

    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::Delivered { attempts: 1 }
    );

    let stored = event(&env, &event_id);
    assert_eq!(stored.delivery_status, DeliveryStatus::Succeeded);
    assert_eq!(stored.attempts, 1);
    assert!(stored.delivered_at.is_some());

    let received = rx.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let (headers, body) = &received[0];
    assert_eq!(body.as_ref(), stored.payload.as_bytes());
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["x-webhook-event-type"], "transaction.succeeded");
    let signature = headers["x-webhook-signature"].to_str().unwrap();
    assert!(verify_signature(TEST_WEBHOOK_SECRET, body, signature).unwrap());

    // Already finalized
    assert_eq!(deliver_once(&env, &event_id).await, DeliveryOutcome::Skipped);
    assert_eq!(rx.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_errors_retry_with_backoff_then_fail() {
    let (url, rx) = spawn_receiver(500).await;
    let env = env_with_endpoint(Some(url));
    let event_id = produce_event(&env).await;

    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::RetryScheduled {
            attempts: 1,
            delay: Duration::from_secs(2)
        }
    );
    assert_eq!(event(&env, &event_id).delivery_status, DeliveryStatus::Pending);
    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::RetryScheduled {
            attempts: 2,
            delay: Duration::from_secs(4)
        }
    );
    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::Failed { attempts: 3 }
    );

    let stored = event(&env, &event_id);
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.last_error.as_deref(), Some("HTTP 500"));
    assert!(stored.delivered_at.is_none());

    let delays: Vec<Option<Duration>> = env.queue.take().into_iter().map(|t| t.delay).collect();
    assert_eq!(
        delays,
        vec![Some(Duration::from_secs(2)), Some(Duration::from_secs(4))]
    );
    assert_eq!(rx.received.lock().unwrap().len(), 3);

    // Terminal: no further attempts
    assert_eq!(deliver_once(&env, &event_id).await, DeliveryOutcome::Skipped);
    assert_eq!(event(&env, &event_id).attempts, 3);
}

#[tokio::test]
async fn test_recovery_after_transient_failure() {
    let (url, rx) = spawn_receiver(503).await;
    let env = env_with_endpoint(Some(url));
    let event_id = produce_event(&env).await;

    assert!(matches!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::RetryScheduled { attempts: 1, .. }
    ));
    rx.status.store(204, Ordering::SeqCst);
    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::Delivered { attempts: 2 }
    );
    assert_eq!(event(&env, &event_id).delivery_status, DeliveryStatus::Succeeded);
}

#[tokio::test]
async fn test_unreachable_endpoint_exhausts_attempts() {
    let env = env_with_endpoint(Some(unreachable_url().await));
    let event_id = produce_event(&env).await;

    let mut last = None;
    for _ in 0..3 {
        last = Some(deliver_once(&env, &event_id).await);
    }
    assert_eq!(last, Some(DeliveryOutcome::Failed { attempts: 3 }));

    let stored = event(&env, &event_id);
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert!(stored.last_error.is_some());
}

#[tokio::test]
async fn test_without_endpoint_events_are_stored_only() {
    let env = env_with_endpoint(None);
    let event_id = produce_event(&env).await;

    assert_eq!(deliver_once(&env, &event_id).await, DeliveryOutcome::NoEndpoint);
    let stored = event(&env, &event_id);
    assert_eq!(stored.delivery_status, DeliveryStatus::Succeeded);
    assert_eq!(stored.attempts, 0);
    assert!(env.queue.is_empty());
}

#[tokio::test]
async fn test_unknown_event_is_skipped() {
    let env = env_with_endpoint(None);
    assert_eq!(deliver_once(&env, "evt_missing").await, DeliveryOutcome::Skipped);
}

#[tokio::test]
async fn test_recover_pending_requeues_only_pending() {
    let env = env_with_endpoint(None);
    let first = produce_event(&env).await;
    let second = produce_event(&env).await;
    deliver_once(&env, &first).await;

    let recovered = webhooks::recover_pending(&env.state.db, env.queue.as_ref()).unwrap();
    assert_eq!(recovered, 1);
    let tasks = env.queue.take();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].event_id, second);
}

#[tokio::test]
async fn test_channel_queue_workers_deliver_end_to_end() {
    let (url, rx) = spawn_receiver(200).await;
    let env = env_with_endpoint(Some(url));
    let event_id = produce_event(&env).await;

    let queue = webhooks::start_workers(env.state.db.clone(), env.state.webhook.clone()).unwrap();
    webhooks::TaskQueue::enqueue(queue.as_ref(), &event_id);

    let mut delivered = false;
    for _ in 0..100 {
        if event(&env, &event_id).delivery_status == DeliveryStatus::Succeeded {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(delivered, "worker should deliver the event");
    assert_eq!(rx.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unrecorded_attempt_is_rescheduled() {
    let (url, rx) = spawn_receiver(200).await;
    let env = env_with_endpoint(Some(url));
    let event_id = produce_event(&env).await;

    env.conn()
        .execute_batch(
            "CREATE TRIGGER reject_delivered BEFORE UPDATE ON webhook_events
             WHEN NEW.delivery_status = 'succeeded'
             BEGIN SELECT RAISE(ABORT, 'store unavailable'); END;",
        )
        .unwrap();

    let client = webhooks::http_client(&env.state.webhook).unwrap();
    let result = webhooks::deliver(
        &env.state.db,
        &env.state.webhook,
        &client,
        env.queue.as_ref(),
        &event_id,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(rx.received.lock().unwrap().len(), 1);

    let stored = event(&env, &event_id);
    assert_eq!(stored.delivery_status, DeliveryStatus::Pending);
    assert_eq!(stored.attempts, 1);

    let tasks = env.queue.take();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].event_id, event_id);
    assert_eq!(tasks[0].delay, Some(Duration::from_secs(2)));

    // Once the store recovers the retry finalizes the event
    env.conn().execute_batch("DROP TRIGGER reject_delivered;").unwrap();
    assert_eq!(
        deliver_once(&env, &event_id).await,
        DeliveryOutcome::Delivered { attempts: 2 }
    );
}
