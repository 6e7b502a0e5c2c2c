use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::pricing::LineRequest;
use crate::services::CheckoutRequest;
use crate::AppState;

use super::user_id_from_headers;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutItemDto {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Optional client-side price, audited against the catalog price.
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutDto {
    #[validate(length(min = 1))]
    pub shipping_method: String,
    #[validate(length(min = 1))]
    pub payment_method: String,
    #[validate(email)]
    pub payer_email: Option<String>,
    /// Explicit items; omit to check out the stored cart.
    pub items: Option<Vec<CheckoutItemDto>>,
}

// POST /api/v1/checkout
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutDto,
    responses(
        (status = 201, description = "Order created with a hosted payment invoice"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment provider rejected the invoice", body = crate::errors::ErrorResponse),
        (status = 409, description = "Promotion capacity exhausted", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<CheckoutDto>,
) -> Result<impl IntoResponse, ServiceError> {
    dto.validate()?;

    let user_id = user_id_from_headers(&headers)?;

    let request = CheckoutRequest {
        shipping_method: dto.shipping_method,
        payment_method: dto.payment_method,
        payer_email: dto.payer_email,
        items: dto.items.map(|items| {
            items
                .into_iter()
                .map(|item| LineRequest {
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect()
        }),
    };

    let outcome = state.services.checkout.checkout(user_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "order": outcome.order,
            "items": outcome.items,
            "invoice": outcome.invoice,
            "redirect_url": outcome.redirect_url,
            "invoice_pdf_url": outcome.invoice_pdf_url,
        })),
    ))
}
