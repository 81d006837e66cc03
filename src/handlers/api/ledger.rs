use axum::extract::State;
use serde_json::{Value, json};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::ledger;
use crate::middleware::AuthedMerchant;
use crate::pagination::{PageMeta, PaginationQuery};

/// GET /api/v1/ledger
///
/// Totals cover the whole ledger; `entries` is the requested page, newest first.
pub async fn get_ledger(
    State(state): State<AppState>,
    merchant: AuthedMerchant,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let totals = ledger::totals(&conn, merchant.id())?;
    let (entries, total) =
        queries::list_ledger_entries(&conn, merchant.id(), page.limit(), page.offset())?;

    Ok(Json(json!({
        "data": {
            "charges_total": totals.charges_total,
            "refunds_total": totals.refunds_total,
            "fees_total": totals.fees_total,
            "net": totals.net,
            "entries": entries,
        },
        "meta": PageMeta {
            total,
            limit: page.limit(),
            offset: page.offset(),
        },
    })))
}
