mod from_row;
pub mod queries;
mod schema;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::WebhookConfig;
use crate::processor::Processor;
use crate::webhooks::TaskQueue;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by handlers and core operations.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Stand-in for the external payment network.
    pub processor: Arc<dyn Processor>,
    /// Upper bound on a single processor call.
    pub processor_timeout: Duration,
    /// Signing secret, endpoint and retry policy for webhooks.
    pub webhook: WebhookConfig,
    /// Delivery work queue. Events are enqueued only after their unit commits.
    pub queue: Arc<dyn TaskQueue>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    Pool::builder().max_size(10).build(manager)
}
