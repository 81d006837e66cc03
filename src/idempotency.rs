//! Idempotency guard for side-effecting requests.
//!
//! A (merchant, key, endpoint) triple maps to at most one execution. The first
//! caller inserts a pending placeholder (the UNIQUE constraint picks exactly one
//! winner among concurrent duplicates), runs its work, then finalizes the record
//! with the serialized response. Later callers get that response back verbatim.
//!
//! Replays are not checked against the original parameters: a reused key with
//! different inputs returns the first cached response.

use std::future::Future;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::crypto::sha256_hex;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::IdempotencyState;

/// Endpoint names that scope idempotency keys.
pub mod endpoint {
    pub const CREATE_PAYMENT_INTENT: &str = "create_payment_intent";
    pub const AUTHORIZE: &str = "authorize";
    pub const CAPTURE: &str = "capture";
    pub const VOID: &str = "void";
    pub const REFUND: &str = "refund";
}

/// A fully serialized response. Stored as-is so replays are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub status: u16,
    pub body: String,
}

impl OperationResponse {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self> {
        Ok(Self {
            status: status.as_u16(),
            body: serde_json::to_string(value)?,
        })
    }

    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

impl IntoResponse for OperationResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

/// Proof that this caller owns the pending placeholder for a key.
#[derive(Debug)]
pub struct Ticket {
    record_id: String,
}

#[derive(Debug)]
pub enum Guard {
    /// No key supplied; idempotency does not apply.
    Bypass,
    /// A finalized response exists for this key.
    Cached(OperationResponse),
    /// This caller must do the work and then `store` or `release`.
    Acquired(Ticket),
}

/// Fingerprint of the normalized request parameters.
///
/// `serde_json::Value` objects serialize with sorted keys, so logically equal
/// parameter sets hash the same regardless of field order.
pub fn request_hash(params: &serde_json::Value) -> String {
    sha256_hex(params.to_string().as_bytes())
}

fn cached_or_in_flight(
    conn: &Connection,
    merchant_id: &str,
    key: &str,
    endpoint: &str,
) -> Result<Option<Guard>> {
    let Some(record) = queries::get_idempotency_record(conn, merchant_id, key, endpoint)? else {
        return Ok(None);
    };
    match (record.state, record.response_body, record.response_status) {
        (IdempotencyState::Completed, Some(body), Some(status)) => {
            Ok(Some(Guard::Cached(OperationResponse { status, body })))
        }
        _ => Err(AppError::IdempotencyInFlight),
    }
}

/// Look up or claim the (merchant, key, endpoint) triple.
pub fn begin(
    conn: &Connection,
    merchant_id: &str,
    key: Option<&str>,
    endpoint: &str,
    params: &serde_json::Value,
) -> Result<Guard> {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(Guard::Bypass);
    };

    if let Some(guard) = cached_or_in_flight(conn, merchant_id, key, endpoint)? {
        return Ok(guard);
    }

    let hash = request_hash(params);
    match queries::insert_idempotency_placeholder(conn, merchant_id, key, endpoint, &hash)? {
        Some(record_id) => Ok(Guard::Acquired(Ticket { record_id })),
        // Lost the insert race to a concurrent duplicate.
        None => cached_or_in_flight(conn, merchant_id, key, endpoint)?
            .ok_or(AppError::IdempotencyInFlight),
    }
}

/// Finalize the record with the response. It is immutable afterwards.
pub fn store(conn: &Connection, ticket: Ticket, response: &OperationResponse) -> Result<()> {
    if !queries::complete_idempotency_record(
        conn,
        &ticket.record_id,
        &response.body,
        response.status,
    )? {
        tracing::warn!(record_id = %ticket.record_id, "Idempotency record was not pending");
    }
    Ok(())
}

/// Remove the placeholder so the caller can retry with the same key.
pub fn release(conn: &Connection, ticket: Ticket) -> Result<()> {
    queries::delete_pending_idempotency_record(conn, &ticket.record_id)?;
    Ok(())
}

/// Run `work` at most once per key, replaying the stored response otherwise.
///
/// Errors from `work` are not cached: the placeholder is released and the error
/// returned, so a corrected retry under the same key can still succeed. The same
/// happens when the returned future is dropped before `work` finishes.
pub async fn run_guarded<F, Fut>(
    db: &DbPool,
    merchant_id: &str,
    key: Option<&str>,
    endpoint: &str,
    params: &serde_json::Value,
    work: F,
) -> Result<OperationResponse>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<OperationResponse>>,
{
    let guard = {
        let conn = db.get()?;
        begin(&conn, merchant_id, key, endpoint, params)?
    };

    let ticket = match guard {
        Guard::Bypass => return work().await,
        Guard::Cached(response) => {
            tracing::debug!(endpoint, "Replaying cached idempotent response");
            return Ok(response);
        }
        Guard::Acquired(ticket) => ticket,
    };

    // Released on error and when this future is dropped mid-flight.
    let claim = Claim {
        db,
        ticket: Some(ticket),
    };
    let response = work().await?;
    claim.complete(&response)?;
    Ok(response)
}

/// Owns a pending placeholder until `complete` finalizes it. Dropping an
/// unfinished claim deletes the placeholder so the key can be retried.
struct Claim<'a> {
    db: &'a DbPool,
    ticket: Option<Ticket>,
}

impl Claim<'_> {
    fn complete(mut self, response: &OperationResponse) -> Result<()> {
        let Some(ticket) = self.ticket.take() else {
            return Ok(());
        };
        let conn = self.db.get()?;
        store(&conn, ticket, response)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let record_id = ticket.record_id.clone();
        let result = self
            .db
            .get()
            .map_err(AppError::from)
            .and_then(|conn| release(&conn, ticket));
        match result {
            Ok(()) => tracing::debug!(record_id = %record_id, "Released idempotency placeholder"),
            Err(e) => tracing::warn!(
                record_id = %record_id,
                error = %e,
                "Failed to release idempotency placeholder"
            ),
        }
    }
}
