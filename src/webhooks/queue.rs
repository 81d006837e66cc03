use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::config::WebhookConfig;
use crate::db::{DbPool, queries};
use crate::error::Result;

use super::delivery::{deliver, http_client};

/// Work queue for webhook delivery, keyed by event id.
///
/// Implementations must deliver each item at least once. `schedule` re-runs the
/// delivery routine after `delay`.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, event_id: &str);
    fn schedule(&self, event_id: &str, delay: Duration);
}

/// In-process queue backed by a tokio channel and drained by worker tasks.
///
/// Durability comes from the `webhook_events` table: anything still `pending`
/// after a restart is re-enqueued by [`recover_pending`].
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl TaskQueue for ChannelQueue {
    fn enqueue(&self, event_id: &str) {
        if self.tx.send(event_id.to_string()).is_err() {
            tracing::warn!(event_id, "Webhook queue closed, event left pending");
        }
    }

    fn schedule(&self, event_id: &str, delay: Duration) {
        let tx = self.tx.clone();
        let event_id = event_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(event_id.clone()).is_err() {
                tracing::warn!(event_id = %event_id, "Webhook queue closed, retry dropped");
            }
        });
    }
}

/// Start `config.workers` delivery workers and return the queue feeding them.
pub fn start_workers(db: DbPool, config: WebhookConfig) -> Result<Arc<ChannelQueue>> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let queue = Arc::new(ChannelQueue { tx });
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let client = http_client(&config)?;

    for worker in 0..config.workers {
        let rx = rx.clone();
        let db = db.clone();
        let config = config.clone();
        let client = client.clone();
        let queue: Arc<dyn TaskQueue> = queue.clone();

        tokio::spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                let Some(event_id) = next else {
                    break;
                };

                let result = AssertUnwindSafe(deliver(&db, &config, &client, queue.as_ref(), &event_id))
                    .catch_unwind()
                    .await;

                match result {
                    Ok(Ok(outcome)) => {
                        tracing::debug!(worker, event_id = %event_id, ?outcome, "Webhook delivery finished");
                    }
                    Ok(Err(e)) => {
                        tracing::error!(worker, event_id = %event_id, error = %e, "Webhook delivery errored");
                    }
                    Err(panic) => {
                        let panic_msg = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        tracing::error!(
                            "Webhook worker {} panicked for event '{}': {}",
                            worker,
                            event_id,
                            panic_msg
                        );
                    }
                }
            }
        });
    }

    tracing::info!("Started {} webhook delivery workers", config.workers);
    Ok(queue)
}

/// Re-enqueue every event still pending. Returns how many were enqueued.
pub fn recover_pending(db: &DbPool, queue: &dyn TaskQueue) -> Result<usize> {
    let ids = {
        let conn = db.get()?;
        queries::list_pending_webhook_event_ids(&conn)?
    };
    for id in &ids {
        queue.enqueue(id);
    }
    if !ids.is_empty() {
        tracing::info!("Re-enqueued {} pending webhook events", ids.len());
    }
    Ok(ids.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub event_id: String,
    /// `None` for immediate work, `Some` for a delayed retry.
    pub delay: Option<Duration>,
}

/// Queue that only records what was asked of it. Callers drain it by hand.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<QueuedTask>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<QueuedTask> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<QueuedTask> {
        std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskQueue for RecordingQueue {
    fn enqueue(&self, event_id: &str) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(QueuedTask {
                event_id: event_id.to_string(),
                delay: None,
            });
    }

    fn schedule(&self, event_id: &str, delay: Duration) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(QueuedTask {
                event_id: event_id.to_string(),
                delay: Some(delay),
            });
    }
}
