//! HTTP layer: thin axum handlers that translate requests into service
//! calls and `ServiceError` into responses.

pub mod cart;
pub mod checkout;
pub mod payment_webhooks;
pub mod redirects;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::errors::ServiceError;

const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity as forwarded by the authenticating edge in the
/// `x-user-id` header. Absent for guest checkouts.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<Option<Uuid>, ServiceError> {
    match headers.get(USER_ID_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                ServiceError::ValidationError("Invalid x-user-id header".to_string())
            })?;
            let id = Uuid::parse_str(raw).map_err(|_| {
                ServiceError::ValidationError("x-user-id must be a UUID".to_string())
            })?;
            Ok(Some(id))
        }
    }
}

/// Like [`user_id_from_headers`] but for endpoints that require a caller.
pub fn require_user_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    user_id_from_headers(headers)?
        .ok_or_else(|| ServiceError::Unauthorized("x-user-id header is required".to_string()))
}
