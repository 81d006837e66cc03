use std::time::Duration;

use reqwest::Client;

use crate::config::WebhookConfig;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result, sanitize_error_message};
use crate::models::DeliveryStatus;

use super::queue::TaskQueue;
use super::{EVENT_TYPE_HEADER, SIGNATURE_HEADER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Event no longer pending (already finalized) or missing.
    Skipped,
    /// No endpoint configured; the event is stored and marked delivered.
    NoEndpoint,
    /// The endpoint answered 2xx.
    Delivered { attempts: i64 },
    /// Failed attempt; another one is scheduled after `delay`.
    RetryScheduled { attempts: i64, delay: Duration },
    /// Attempts exhausted; the event is finalized as failed.
    Failed { attempts: i64 },
}

/// HTTP client with the delivery connect and read bounds applied.
pub fn http_client(config: &WebhookConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.read_timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build webhook HTTP client: {}", e)))
}

/// Run one delivery attempt for `event_id`.
///
/// A 2xx response finalizes the event as `succeeded`. Any other response or a
/// transport error counts as a failed attempt: once `max_attempts` is reached the
/// event is finalized as `failed`, otherwise a retry is scheduled on `queue`
/// after `backoff_multiplier ^ attempts` seconds. A retry is also scheduled when
/// the attempt cannot be recorded afterwards.
pub async fn deliver(
    db: &DbPool,
    config: &WebhookConfig,
    client: &Client,
    queue: &dyn TaskQueue,
    event_id: &str,
) -> Result<DeliveryOutcome> {
    let (event, attempts, url) = {
        let conn = db.get()?;
        let Some(event) = queries::get_webhook_event(&conn, event_id)? else {
            tracing::warn!(event_id, "Webhook event not found, skipping delivery");
            return Ok(DeliveryOutcome::Skipped);
        };
        if event.delivery_status != DeliveryStatus::Pending {
            return Ok(DeliveryOutcome::Skipped);
        }

        let Some(url) = config.endpoint_url.as_deref() else {
            queries::mark_webhook_succeeded(&conn, event_id)?;
            tracing::debug!(event_id, "No webhook endpoint configured, event stored only");
            return Ok(DeliveryOutcome::NoEndpoint);
        };

        let attempts = queries::increment_webhook_attempts(&conn, event_id)?;
        (event, attempts, url)
    };

    let failure = match client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, &event.signature)
        .header(EVENT_TYPE_HEADER, &event.event_type)
        .body(event.payload.clone())
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => None,
        Ok(resp) => Some(format!("HTTP {}", resp.status().as_u16())),
        Err(e) => Some(sanitize_error_message(&e.to_string())),
    };

    match finish_attempt(db, config, queue, event_id, &event.event_type, attempts, failure) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // The attempt is already counted; the event must not be stranded as pending.
            let delay = config.backoff_delay(attempts);
            queue.schedule(event_id, delay);
            tracing::warn!(
                event_id,
                attempts,
                delay_secs = delay.as_secs(),
                error = %sanitize_error_message(&e.to_string()),
                "Failed to record webhook attempt, retry scheduled"
            );
            Err(e)
        }
    }
}

fn finish_attempt(
    db: &DbPool,
    config: &WebhookConfig,
    queue: &dyn TaskQueue,
    event_id: &str,
    event_type: &str,
    attempts: i64,
    failure: Option<String>,
) -> Result<DeliveryOutcome> {
    let conn = db.get()?;
    let Some(error) = failure else {
        queries::mark_webhook_succeeded(&conn, event_id)?;
        tracing::info!(event_id, attempts, event_type, "Webhook delivered");
        return Ok(DeliveryOutcome::Delivered { attempts });
    };

    if attempts >= config.max_attempts {
        queries::mark_webhook_failed(&conn, event_id, &error)?;
        tracing::warn!(
            event_id,
            attempts,
            error = %error,
            "Webhook delivery failed after {} attempts",
            config.max_attempts
        );
        return Ok(DeliveryOutcome::Failed { attempts });
    }

    queries::record_webhook_error(&conn, event_id, &error)?;
    drop(conn);

    let delay = config.backoff_delay(attempts);
    queue.schedule(event_id, delay);
    tracing::info!(
        event_id,
        attempts,
        delay_secs = delay.as_secs(),
        error = %error,
        "Webhook delivery failed, retry scheduled"
    );
    Ok(DeliveryOutcome::RetryScheduled { attempts, delay })
}
