//! HTTP API modules
//!
//! Each submodule owns one resource and exposes a `router()` registered
//! in [`crate::routes`]. Every loyalty route is tenant-scoped through the
//! `X-Merchant-Id` header, extracted here as [`MerchantId`].

pub mod health;
pub mod loyalty;
pub mod settings;
pub mod tiers;

use axum::extract::FromRequestParts;
use http::request::Parts;
use shared::error::{AppError, ErrorCode};

pub const MERCHANT_HEADER: &str = "x-merchant-id";

/// Tenant scope for a request, taken from the `X-Merchant-Id` header.
///
/// The gateway in front of this service authenticates the merchant and
/// injects the header; a missing or malformed value is rejected before
/// any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantId(pub i64);

impl<S> FromRequestParts<S> for MerchantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(MERCHANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(MerchantId)
            .ok_or_else(|| AppError::new(ErrorCode::MerchantHeaderMissing))
    }
}

/// Common limit/offset query parameters
#[derive(Debug, serde::Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamp to sane bounds: limit in [1, 200], offset >= 0
    pub fn clamp(&self, default_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 200);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
