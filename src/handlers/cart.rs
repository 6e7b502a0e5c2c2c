use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::AppState;

use super::require_user_id;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartItemDto {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

// GET /api/v1/cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "The caller's cart items"),
        (status = 401, description = "Missing caller identity", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user_id(&headers)?;
    let items = state.services.cart.items(user_id).await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

// POST /api/v1/cart/items
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddCartItemDto,
    responses(
        (status = 201, description = "Item added or merged"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not available", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<AddCartItemDto>,
) -> Result<impl IntoResponse, ServiceError> {
    dto.validate()?;
    let user_id = require_user_id(&headers)?;

    let item = state
        .services
        .cart
        .add_item(user_id, dto.product_id, dto.variant_id, dto.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

// DELETE /api/v1/cart/items/:id
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "No such item in the caller's cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user_id(&headers)?;
    state.services.cart.remove_item(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
