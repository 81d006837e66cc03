//! Processor abstraction: the stand-in for the external payment network.
//!
//! The core only needs `attempt(kind, amount) -> approved?` within a bounded
//! time. [`SimulatedProcessor`] draws from per-kind success rates;
//! [`ScriptedProcessor`] gives deterministic outcomes and artificial latency.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::SuccessRates;
use crate::models::TransactionKind;

#[async_trait]
pub trait Processor: Send + Sync {
    /// Returns whether the processor approved the action.
    async fn attempt(&self, kind: TransactionKind, amount_cents: i64) -> bool;
}

/// Outcome of a time-bounded processor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorOutcome {
    Approved,
    Declined,
    TimedOut,
}

/// Call the processor, treating an overrun of `timeout` as a distinct failure.
pub async fn attempt_with_timeout(
    processor: &dyn Processor,
    kind: TransactionKind,
    amount_cents: i64,
    timeout: Duration,
) -> ProcessorOutcome {
    match tokio::time::timeout(timeout, processor.attempt(kind, amount_cents)).await {
        Ok(true) => ProcessorOutcome::Approved,
        Ok(false) => ProcessorOutcome::Declined,
        Err(_) => ProcessorOutcome::TimedOut,
    }
}

/// Sandbox processor approving each kind with a configured probability.
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    rates: SuccessRates,
}

impl SimulatedProcessor {
    pub fn new(rates: SuccessRates) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl Processor for SimulatedProcessor {
    async fn attempt(&self, kind: TransactionKind, _amount_cents: i64) -> bool {
        let rate = self.rates.for_kind(kind).clamp(0.0, 1.0);
        rand::thread_rng().gen_bool(rate)
    }
}

/// Deterministic processor for tests and local demos.
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    declined: Mutex<HashSet<TransactionKind>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedProcessor {
    /// Approves everything immediately.
    pub fn approve_all() -> Self {
        Self::default()
    }

    pub fn decline(self, kind: TransactionKind) -> Self {
        self.set_declined(kind, true);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    pub fn set_declined(&self, kind: TransactionKind, declined: bool) {
        let mut set = self.declined.lock().unwrap_or_else(|e| e.into_inner());
        if declined {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    async fn attempt(&self, kind: TransactionKind, _amount_cents: i64) -> bool {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        !self
            .declined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }
}
