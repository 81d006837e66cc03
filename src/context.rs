use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context threaded explicitly through every core operation.
///
/// Carries the request identifier that links log lines and audit entries back to
/// the originating call, and the merchant resolved by authentication.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub merchant_id: Option<String>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            merchant_id: None,
        }
    }

    /// Context for work not tied to an inbound request (startup, workers, tests).
    pub fn system() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_merchant(mut self, merchant_id: impl Into<String>) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(RequestContext::system))
    }
}
