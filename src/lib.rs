//! Paygate - transactional core of a small payment gateway
//!
//! This library turns merchant actions (authorize, capture, void, refund) into a
//! consistent, replay-safe financial record and notifies merchants of outcomes
//! through signed, retried webhooks. The HTTP layer in `handlers` is a thin shell
//! over the core modules.

pub mod audit;
pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod idempotency;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod processor;
pub mod webhooks;
