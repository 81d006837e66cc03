use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::context::RequestContext;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::Merchant;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The merchant resolved from `X-API-KEY`. Every core call is scoped by it.
#[derive(Debug, Clone)]
pub struct AuthedMerchant(pub Merchant);

impl AuthedMerchant {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Merchant> {
    let api_key = extract_api_key(headers)
        .ok_or_else(|| AppError::Unauthorized(msg::MISSING_API_KEY.into()))?;
    let conn = state.db.get()?;
    queries::get_merchant_by_api_key(&conn, api_key)?
        .filter(Merchant::is_active)
        .ok_or_else(|| AppError::Unauthorized(msg::INVALID_API_KEY.into()))
}

pub async fn merchant_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let merchant = authenticate(&state, request.headers())?;

    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(RequestContext::system)
        .with_merchant(merchant.id.clone());
    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(AuthedMerchant(merchant));

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthedMerchant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthedMerchant>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(msg::MISSING_API_KEY.into()))
    }
}
