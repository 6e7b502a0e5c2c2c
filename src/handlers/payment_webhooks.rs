use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::Value;
use tracing::warn;

use crate::errors::ServiceError;
use crate::AppState;

const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

// POST /api/v1/payments/webhook
//
// The provider retries until it sees a 2xx, so every understood payload
// is acknowledged with 200 even when it references nothing we know.
// Only a bad token, an unreadable payload, or a database failure (which
// is worth a retry) answer otherwise.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Callback accepted"),
        (status = 400, description = "Malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid callback token", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(expected) = &state.config.payment.callback_token {
        let presented = headers
            .get(CALLBACK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            warn!("payment callback with missing or wrong token rejected");
            return Err(ServiceError::Unauthorized(
                "invalid callback token".to_string(),
            ));
        }
    }

    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid json: {}", e)))?;

    state.services.reconciliation.reconcile(&payload).await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
